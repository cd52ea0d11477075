//! Reads the components of one XSD document.

use regex::Regex;
use roxmltree::Node;

use super::{
    AttributeGroup, AttributeUse, BuiltIn, ComplexType, CompositeSchema, Content, Derivation,
    ElementDecl, Name, NamespaceConstraint, Particle, Process, Restriction, SimpleType, Term,
    Wildcard,
};
use crate::config::XML_SCHEMA_NS_URI;
use crate::error::{BindingError, Result};

pub(super) struct SchemaReader<'a> {
    /// Descriptor namespace the schema was resolved for.
    namespace: &'a str,
    target: String,
    qualified_elements: bool,
    qualified_attributes: bool,
}

impl<'a> SchemaReader<'a> {
    pub(super) fn new(namespace: &'a str, root: Node<'_, '_>) -> Self {
        Self {
            namespace,
            target: root.attribute("targetNamespace").unwrap_or_default().to_string(),
            qualified_elements: root.attribute("elementFormDefault") == Some("qualified"),
            qualified_attributes: root.attribute("attributeFormDefault") == Some("qualified"),
        }
    }

    /// Read the global components of `root` into `into`.
    pub(super) fn read(&self, root: Node<'_, '_>, into: &mut CompositeSchema) -> Result<()> {
        for child in xsd_children(root) {
            match child.tag_name().name() {
                "element" => {
                    let decl = self.read_element(child, true)?;
                    into.elements.insert(decl.name.clone(), decl);
                }
                "complexType" => {
                    let name = self.global_name(child)?;
                    into.complex_types.insert(name, self.read_complex_type(child)?);
                }
                "simpleType" => {
                    let name = self.global_name(child)?;
                    into.simple_types.insert(name, self.read_simple_type(child)?);
                }
                "group" => {
                    let name = self.global_name(child)?;
                    into.groups.insert(name, self.read_group(child)?);
                }
                "attribute" => {
                    let attribute = self.read_attribute(child, true)?;
                    into.attributes.insert(attribute.name.clone(), attribute);
                }
                "attributeGroup" => {
                    let name = self.global_name(child)?;
                    into.attribute_groups.insert(name, self.read_attribute_group(child)?);
                }
                "annotation" | "import" | "include" | "notation" => {}
                other => {
                    tracing::debug!(
                        namespace = %self.target,
                        component = %other,
                        "Unsupported schema component skipped"
                    );
                }
            }
        }
        Ok(())
    }

    fn error(&self, reason: impl Into<String>) -> BindingError {
        BindingError::SchemaResolution {
            namespace: self.namespace.to_string(),
            reason: reason.into(),
        }
    }

    fn required_attribute<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str> {
        node.attribute(name).ok_or_else(|| {
            self.error(format!(
                "'{}' declaration without a '{name}' attribute",
                node.tag_name().name()
            ))
        })
    }

    fn global_name(&self, node: Node<'_, '_>) -> Result<Name> {
        Ok(Name::new(&self.target, self.required_attribute(node, "name")?))
    }

    /// Resolve a prefixed reference such as `xs:string` or `o:Party`.
    fn resolve_qname(&self, node: Node<'_, '_>, value: &str) -> Result<Name> {
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, value),
        };
        let namespace = match node.lookup_namespace_uri(prefix) {
            Some(uri) => uri,
            None if prefix.is_none() => "",
            None => return Err(self.error(format!("prefix of '{value}' is not declared"))),
        };
        Ok(Name::new(namespace, local))
    }

    fn simple_type_of(name: Name) -> SimpleType {
        if name.is_xsd() {
            SimpleType::BuiltIn(BuiltIn::from_local(&name.local))
        } else {
            SimpleType::Named(name)
        }
    }

    fn form(node: Node<'_, '_>, default: bool) -> bool {
        match node.attribute("form") {
            Some("qualified") => true,
            Some("unqualified") => false,
            _ => default,
        }
    }

    fn read_element(&self, node: Node<'_, '_>, global: bool) -> Result<ElementDecl> {
        let local = self.required_attribute(node, "name")?;
        let namespace = if global || Self::form(node, self.qualified_elements) {
            self.target.as_str()
        } else {
            ""
        };
        Ok(ElementDecl {
            name: Name::new(namespace, local),
            content: self.read_element_content(node)?,
        })
    }

    fn read_element_content(&self, node: Node<'_, '_>) -> Result<Content> {
        if let Some(type_ref) = node.attribute("type") {
            let name = self.resolve_qname(node, type_ref)?;
            return Ok(match (name.is_xsd(), name.local.as_str()) {
                (true, "anyType") => Content::Any,
                (true, local) => Content::Simple(SimpleType::BuiltIn(BuiltIn::from_local(local))),
                (false, _) => Content::Named(name),
            });
        }
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "complexType" => {
                    return Ok(Content::Complex(Box::new(self.read_complex_type(child)?)));
                }
                "simpleType" => return Ok(Content::Simple(self.read_simple_type(child)?)),
                _ => {}
            }
        }
        Ok(Content::Any)
    }

    fn read_simple_type(&self, node: Node<'_, '_>) -> Result<SimpleType> {
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "restriction" => return self.read_restriction(child),
                "list" | "union" => {
                    tracing::debug!(
                        namespace = %self.target,
                        derivation = %child.tag_name().name(),
                        "Simple type values are not checked"
                    );
                    return Ok(SimpleType::BuiltIn(BuiltIn::AnySimple));
                }
                _ => {}
            }
        }
        Ok(SimpleType::BuiltIn(BuiltIn::AnySimple))
    }

    fn read_restriction(&self, node: Node<'_, '_>) -> Result<SimpleType> {
        let base = match node.attribute("base") {
            Some(base) => Self::simple_type_of(self.resolve_qname(node, base)?),
            None => match xsd_children(node).find(|child| child.tag_name().name() == "simpleType") {
                Some(inline) => self.read_simple_type(inline)?,
                None => SimpleType::BuiltIn(BuiltIn::AnySimple),
            },
        };

        let mut restriction = Restriction {
            base,
            enumeration: Vec::new(),
            pattern: None,
            min_length: None,
            max_length: None,
        };
        let mut patterns = Vec::new();
        for facet in xsd_children(node) {
            let Some(value) = facet.attribute("value") else {
                continue;
            };
            match facet.tag_name().name() {
                "enumeration" => restriction.enumeration.push(value.to_string()),
                "pattern" => patterns.push(format!("(?:{value})")),
                "length" => {
                    let length = self.read_count(value)?;
                    restriction.min_length = Some(length);
                    restriction.max_length = Some(length);
                }
                "minLength" => restriction.min_length = Some(self.read_count(value)?),
                "maxLength" => restriction.max_length = Some(self.read_count(value)?),
                _ => {}
            }
        }
        restriction.pattern = self.compile_patterns(&patterns);
        Ok(SimpleType::Restricted(Box::new(restriction)))
    }

    /// Patterns of one restriction are alternatives. A pattern the regex
    /// engine does not support is dropped with a warning.
    fn compile_patterns(&self, patterns: &[String]) -> Option<Regex> {
        if patterns.is_empty() {
            return None;
        }
        let source = format!("^(?:{})$", patterns.join("|"));
        match Regex::new(&source) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(
                    namespace = %self.target,
                    pattern = %source,
                    error = %e,
                    "Unsupported schema pattern ignored"
                );
                None
            }
        }
    }

    fn read_count(&self, value: &str) -> Result<usize> {
        value
            .trim()
            .parse()
            .map_err(|_| self.error(format!("'{value}' is not a valid length")))
    }

    fn read_occurs(&self, node: Node<'_, '_>) -> Result<(u32, Option<u32>)> {
        let parse = |value: &str| {
            value
                .trim()
                .parse::<u32>()
                .map_err(|_| self.error(format!("'{value}' is not a valid occurrence bound")))
        };
        let min = node.attribute("minOccurs").map(parse).transpose()?.unwrap_or(1);
        let max = match node.attribute("maxOccurs") {
            Some("unbounded") => None,
            Some(value) => Some(parse(value)?),
            None => Some(1),
        };
        Ok((min, max))
    }

    fn read_particle(&self, node: Node<'_, '_>) -> Result<Option<Particle>> {
        let term = match node.tag_name().name() {
            "element" => match node.attribute("ref") {
                Some(reference) => Term::Ref(self.resolve_qname(node, reference)?),
                None => Term::Element(self.read_element(node, false)?),
            },
            "group" => Term::Group(self.resolve_qname(node, self.required_attribute(node, "ref")?)?),
            "sequence" => Term::Sequence(self.read_particles(node)?),
            "choice" => Term::Choice(self.read_particles(node)?),
            "all" => Term::All(self.read_particles(node)?),
            "any" => Term::Any(self.read_wildcard(node)),
            _ => return Ok(None),
        };
        let (min, max) = self.read_occurs(node)?;
        Ok(Some(Particle { min, max, term }))
    }

    fn read_particles(&self, node: Node<'_, '_>) -> Result<Vec<Particle>> {
        let mut particles = Vec::new();
        for child in xsd_children(node) {
            if let Some(particle) = self.read_particle(child)? {
                particles.push(particle);
            }
        }
        Ok(particles)
    }

    fn read_wildcard(&self, node: Node<'_, '_>) -> Wildcard {
        let namespaces = match node.attribute("namespace").map(str::trim) {
            None | Some("##any") => NamespaceConstraint::Any,
            Some("##other") => NamespaceConstraint::Other(self.target.clone()),
            Some(list) => NamespaceConstraint::Only(
                list.split_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => self.target.clone(),
                        "##local" => String::new(),
                        uri => uri.to_string(),
                    })
                    .collect(),
            ),
        };
        let process = match node.attribute("processContents") {
            Some("skip") => Process::Skip,
            Some("lax") => Process::Lax,
            _ => Process::Strict,
        };
        Wildcard {
            namespaces,
            process,
        }
    }

    /// Model group of a named `xs:group` definition.
    fn read_group(&self, node: Node<'_, '_>) -> Result<Particle> {
        for child in xsd_children(node) {
            if let Some(particle) = self.read_particle(child)? {
                return Ok(particle);
            }
        }
        Err(self.error(format!(
            "group '{}' has no content model",
            node.attribute("name").unwrap_or_default()
        )))
    }

    fn read_attribute(&self, node: Node<'_, '_>, global: bool) -> Result<AttributeUse> {
        let (name, ty) = match node.attribute("ref") {
            Some(reference) => (self.resolve_qname(node, reference)?, None),
            None => {
                let local = self.required_attribute(node, "name")?;
                let namespace = if global || Self::form(node, self.qualified_attributes) {
                    self.target.as_str()
                } else {
                    ""
                };
                let ty = match node.attribute("type") {
                    Some(type_ref) => Self::simple_type_of(self.resolve_qname(node, type_ref)?),
                    None => match xsd_children(node).find(|c| c.tag_name().name() == "simpleType") {
                        Some(inline) => self.read_simple_type(inline)?,
                        None => SimpleType::BuiltIn(BuiltIn::AnySimple),
                    },
                };
                (Name::new(namespace, local), Some(ty))
            }
        };
        let usage = node.attribute("use");
        Ok(AttributeUse {
            name,
            ty,
            required: usage == Some("required"),
            prohibited: usage == Some("prohibited"),
        })
    }

    fn read_attribute_group(&self, node: Node<'_, '_>) -> Result<AttributeGroup> {
        let mut group = AttributeGroup::default();
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "attribute" => group.attributes.push(self.read_attribute(child, false)?),
                "attributeGroup" => {
                    let reference = self.required_attribute(child, "ref")?;
                    group.groups.push(self.resolve_qname(child, reference)?);
                }
                "anyAttribute" => group.any_attribute = true,
                _ => {}
            }
        }
        Ok(group)
    }

    fn read_complex_type(&self, node: Node<'_, '_>) -> Result<ComplexType> {
        let mut ty = ComplexType {
            mixed: node.attribute("mixed") == Some("true"),
            ..ComplexType::default()
        };
        for child in xsd_children(node) {
            let content = child.tag_name().name();
            if !matches!(content, "simpleContent" | "complexContent") {
                self.read_type_item(child, &mut ty)?;
                continue;
            }
            if child.attribute("mixed") == Some("true") {
                ty.mixed = true;
            }
            let derivation = xsd_children(child)
                .find(|d| matches!(d.tag_name().name(), "extension" | "restriction"));
            let Some(derivation) = derivation else {
                continue;
            };
            let base = self.resolve_qname(derivation, self.required_attribute(derivation, "base")?)?;
            if content == "simpleContent" {
                ty.simple_base = Some(Self::simple_type_of(base.clone()));
            }
            if !base.is_xsd() {
                ty.derivation = Some(Derivation {
                    base,
                    extension: derivation.tag_name().name() == "extension",
                });
            }
            for item in xsd_children(derivation) {
                self.read_type_item(item, &mut ty)?;
            }
        }
        Ok(ty)
    }

    fn read_type_item(&self, node: Node<'_, '_>, ty: &mut ComplexType) -> Result<()> {
        match node.tag_name().name() {
            "attribute" => ty.attributes.push(self.read_attribute(node, false)?),
            "attributeGroup" => {
                let reference = self.required_attribute(node, "ref")?;
                ty.attribute_groups.push(self.resolve_qname(node, reference)?);
            }
            "anyAttribute" => ty.any_attribute = true,
            _ => {
                if let Some(particle) = self.read_particle(node)? {
                    ty.particle = Some(particle);
                }
            }
        }
        Ok(())
    }
}

fn xsd_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|child| child.is_element() && child.tag_name().namespace() == Some(XML_SCHEMA_NS_URI))
}
