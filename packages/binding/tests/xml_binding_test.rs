//! Integration tests for reading and writing bean graphs through a single
//! binding configuration.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use beanbinder::rules::BindingConfig;
use beanbinder::{BeanInstance, BeanRef, BindingEngine, BindingError, Value, XmlBinding};

const ORDER_CONFIG: &str = r#"
namespaces:
  o: urn:example:order
types:
  - name: Order
    properties:
      id: integer
      date: date
      header: bean
  - name: Header
    properties:
      customerName: text
      priority: boolean
beans:
  - beanId: order
    class: Order
    createOnElement: /o:order
    values:
      - property: id
        data: /o:order/@id
      - property: date
        data: /o:order/o:date
        decoder:
          format: "%d.%m.%Y"
    wirings:
      - property: header
        beanIdRef: header
  - beanId: header
    class: Header
    createOnElement: /o:order/o:header
    values:
      - property: customerName
        data: /o:order/o:header/o:customer
      - property: priority
        data: /o:order/o:header/o:priority
"#;

fn order_binding() -> XmlBinding {
    let config = BindingConfig::from_yaml(ORDER_CONFIG).expect("Failed to parse config");
    let engine = BindingEngine::from_config(config).expect("Failed to build engine");
    XmlBinding::new(Arc::new(engine)).expect("Failed to build binding")
}

#[test]
fn test_header_round_trip() {
    let config = BindingConfig::from_yaml(
        r#"
types:
  - name: Header
    properties:
      customerName: text
beans:
  - beanId: header
    class: Header
    createOnElement: /order/header
    values:
      - property: customerName
        data: /order/header/customer
"#,
    )
    .unwrap();
    let binding = XmlBinding::new(Arc::new(BindingEngine::from_config(config).unwrap()))
        .unwrap()
        .with_omit_xml_declaration(true);

    let header = binding
        .from_xml(
            "<order><header><customer>Joe</customer></header></order>",
            "Header",
        )
        .unwrap();
    assert_eq!(header.get("customerName"), Some(Value::from("Joe")));

    header.set("customerName", "Ann");
    assert_eq!(
        binding.to_xml(&header).unwrap(),
        "<order><header><customer>Ann</customer></header></order>"
    );
}

#[test]
fn test_namespaced_order_round_trip() {
    let binding = order_binding().with_omit_xml_declaration(true);
    let xml = r#"<o:order xmlns:o="urn:example:order" id="5"><o:date>18.10.2026</o:date><o:header><o:customer>Joe</o:customer><o:priority>true</o:priority></o:header></o:order>"#;

    let order = binding.from_xml(xml, "Order").unwrap();
    assert_eq!(order.get("id"), Some(Value::Integer(5)));
    let Some(Value::Bean(header)) = order.get("header") else {
        panic!("header not wired into order");
    };
    assert_eq!(header.get("priority"), Some(Value::Boolean(true)));

    assert_eq!(binding.to_xml(&order).unwrap(), xml);
}

#[test]
fn test_unset_values_are_not_written() {
    let binding = order_binding().with_omit_xml_declaration(true);
    let order = BeanRef::new(BeanInstance::new("Order"));
    order.set("id", 9_i64);

    assert_eq!(
        binding.to_xml(&order).unwrap(),
        r#"<o:order xmlns:o="urn:example:order" id="9"/>"#
    );
}

#[test]
fn test_xml_declaration_written_by_default() {
    let binding = order_binding();
    let order = BeanRef::new(BeanInstance::new("Order"));
    order.set("id", 1_i64);

    let xml = binding.to_xml(&order).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\"?>"));
}

#[test]
fn test_document_selector_rejected() {
    let config = BindingConfig::from_yaml(
        r##"
types:
  - name: Header
beans:
  - beanId: header
    class: Header
    createOnElement: "#document"
"##,
    )
    .unwrap();

    let err = BindingEngine::from_config(config).unwrap_err();
    assert!(matches!(err, BindingError::Config(_)));
}

#[test]
fn test_wiring_cycle_through_shared_bean_rejected() {
    let config = BindingConfig::from_yaml(
        r#"
types:
  - name: A
    properties:
      b: bean
  - name: B
    properties:
      c: bean
  - name: C
    properties:
      b: bean
beans:
  - beanId: a
    class: A
    createOnElement: /a
    wirings:
      - property: b
        beanIdRef: b
  - beanId: b
    class: B
    createOnElement: /a/b
    wirings:
      - property: c
        beanIdRef: c
  - beanId: c
    class: C
    createOnElement: /a/b/c
    wirings:
      - property: b
        beanIdRef: b
"#,
    )
    .unwrap();

    let err = BindingEngine::from_config(config).unwrap_err();
    assert!(matches!(err, BindingError::Config(ref msg) if msg.contains("Cyclic wiring")));
}

#[test]
fn test_factory_presets_are_bound_and_written() {
    let config = BindingConfig::from_yaml(&ORDER_CONFIG.replace(
        "    createOnElement: /o:order/o:header\n",
        "    createOnElement: /o:order/o:header\n    factory: \"basic:Header(priority=false)\"\n",
    ))
    .unwrap();
    let engine = BindingEngine::from_config(config).unwrap();
    let binding = XmlBinding::new(Arc::new(engine)).unwrap().with_omit_xml_declaration(true);

    let xml = r#"<o:order xmlns:o="urn:example:order" id="5"><o:header><o:customer>Joe</o:customer></o:header></o:order>"#;
    let order = binding.from_xml(xml, "Order").unwrap();
    let Some(Value::Bean(header)) = order.get("header") else {
        panic!("header not wired into order");
    };
    assert_eq!(header.get("customerName"), Some(Value::from("Joe")));
    assert_eq!(header.get("priority"), Some(Value::Boolean(false)));
    assert!(binding
        .to_xml(&order)
        .unwrap()
        .contains("<o:priority>false</o:priority>"));
}

#[test]
fn test_unknown_factory_alias_rejected() {
    let config = BindingConfig::from_yaml(&ORDER_CONFIG.replace(
        "    createOnElement: /o:order/o:header\n",
        "    createOnElement: /o:order/o:header\n    factory: \"spring:headerFactory\"\n",
    ))
    .unwrap();
    let err = BindingEngine::from_config(config).unwrap_err();
    assert!(matches!(err, BindingError::Config(ref msg) if msg.contains("bean factory alias 'spring'")));
}

#[test]
fn test_no_serializer_for_unbound_type() {
    let binding = order_binding();
    let unknown = BeanRef::new(BeanInstance::new("Invoice"));

    let err = binding.to_xml(&unknown).unwrap_err();
    assert!(matches!(err, BindingError::NoSerializer { type_name } if type_name == "Invoice"));
}

#[test]
fn test_nested_bean_has_no_serializer() {
    let binding = order_binding();
    assert!(binding.has_serializer("Order"));
    assert!(!binding.has_serializer("Header"));
}

#[test]
fn test_malformed_date_is_a_conversion_error() {
    let binding = order_binding();
    let err = binding
        .from_xml(
            r#"<o:order xmlns:o="urn:example:order"><o:date>2026-10-18</o:date></o:order>"#,
            "Order",
        )
        .unwrap_err();
    assert!(matches!(err, BindingError::Conversion { .. }));
}

#[test]
fn test_binding_is_shareable_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<XmlBinding>();

    let binding = Arc::new(order_binding().with_omit_xml_declaration(true));
    let handles: Vec<_> = (0..4_i64)
        .map(|id| {
            let binding = Arc::clone(&binding);
            std::thread::spawn(move || {
                let xml = format!(r#"<o:order xmlns:o="urn:example:order" id="{id}"/>"#);
                let order = binding.from_xml(&xml, "Order").unwrap();
                binding.to_xml(&order).unwrap()
            })
        })
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        assert_eq!(
            handle.join().unwrap(),
            format!(r#"<o:order xmlns:o="urn:example:order" id="{id}"/>"#)
        );
    }
}
