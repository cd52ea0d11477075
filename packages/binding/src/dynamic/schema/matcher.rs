//! Content model matching.
//!
//! A particle maps a start position in the child element list to the set of
//! positions it can end at. Sets keep the match exact for nested
//! repetitions without backtracking.

use std::collections::BTreeSet;

use super::{too_deep, CompositeSchema, Name, Particle, Term, MAX_REFERENCE_DEPTH};
use crate::error::Result;

pub(super) struct ContentMatcher<'s, 'n> {
    schema: &'s CompositeSchema,
    names: &'n [Name],
    furthest: usize,
}

impl<'s, 'n> ContentMatcher<'s, 'n> {
    pub(super) fn new(schema: &'s CompositeSchema, names: &'n [Name]) -> Self {
        Self {
            schema,
            names,
            furthest: 0,
        }
    }

    /// Number of children consumed by the longest partial match.
    pub(super) fn furthest(&self) -> usize {
        self.furthest
    }

    /// End positions of `particles` matched one after another from `start`.
    pub(super) fn sequence<'p>(
        &mut self,
        particles: impl IntoIterator<Item = &'p Particle>,
        start: usize,
        depth: usize,
    ) -> Result<BTreeSet<usize>> {
        let mut positions = BTreeSet::from([start]);
        for particle in particles {
            let mut next = BTreeSet::new();
            for &position in &positions {
                next.extend(self.particle(particle, position, depth)?);
            }
            positions = next;
        }
        Ok(positions)
    }

    fn particle(&mut self, particle: &Particle, start: usize, depth: usize) -> Result<BTreeSet<usize>> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(too_deep("model group"));
        }
        let mut reached = BTreeSet::new();
        if particle.min == 0 {
            reached.insert(start);
        }
        let mut frontier = BTreeSet::from([start]);
        let mut count = 0_u32;
        while !frontier.is_empty() && particle.max.map_or(true, |max| count < max) {
            count += 1;
            let mut next = BTreeSet::new();
            for &position in &frontier {
                next.extend(self.term(&particle.term, position, depth)?);
            }
            if count >= particle.min {
                let known = reached.len();
                reached.extend(next.iter().copied());
                // Past the minimum, a round that reaches nothing new never will.
                if count > particle.min && reached.len() == known {
                    break;
                }
            }
            frontier = next;
        }
        Ok(reached)
    }

    fn term(&mut self, term: &Term, start: usize, depth: usize) -> Result<BTreeSet<usize>> {
        let schema = self.schema;
        let positions = match term {
            Term::Element(decl) => self.single(start, |name| *name == decl.name),
            Term::Ref(global) => self.single(start, |name| name == global),
            Term::Any(wildcard) => self.single(start, |name| wildcard.allows(&name.namespace)),
            Term::Group(group) => self.particle(schema.group(group)?, start, depth + 1)?,
            Term::Sequence(particles) => self.sequence(particles, start, depth + 1)?,
            Term::Choice(particles) => {
                let mut positions = BTreeSet::new();
                for particle in particles {
                    positions.extend(self.particle(particle, start, depth + 1)?);
                }
                positions
            }
            Term::All(particles) => self.all(particles, start),
        };
        Ok(positions)
    }

    fn single(&mut self, start: usize, accepts: impl Fn(&Name) -> bool) -> BTreeSet<usize> {
        match self.names.get(start) {
            Some(name) if accepts(name) => {
                self.furthest = self.furthest.max(start + 1);
                BTreeSet::from([start + 1])
            }
            _ => BTreeSet::new(),
        }
    }

    /// Members of an `all` group appear at most once, in any order.
    fn all(&mut self, particles: &[Particle], start: usize) -> BTreeSet<usize> {
        let mut used = vec![false; particles.len()];
        let mut position = start;
        while let Some(name) = self.names.get(position) {
            let member = particles
                .iter()
                .enumerate()
                .position(|(index, particle)| !used[index] && declares(particle, name));
            let Some(member) = member else {
                break;
            };
            used[member] = true;
            position += 1;
            self.furthest = self.furthest.max(position);
        }

        let complete = particles
            .iter()
            .zip(&used)
            .all(|(particle, used)| *used || particle.min == 0);
        if complete {
            BTreeSet::from([position])
        } else {
            BTreeSet::new()
        }
    }
}

fn declares(particle: &Particle, name: &Name) -> bool {
    match &particle.term {
        Term::Element(decl) => decl.name == *name,
        Term::Ref(global) => global == name,
        _ => false,
    }
}
