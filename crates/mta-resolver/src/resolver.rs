//! Reference resolution
//!
//! Every module, resource and provided dependency is a container of
//! parameters and properties that other containers may reference. Each
//! top-level parameter or property is resolved at most once: the first
//! reference to it resolves its own references depth-first, and the result is
//! memoized. Reaching a value that is still being resolved means the
//! references form a cycle. A property may therefore refer to another value
//! of its own container.
//!
//! Names are looked up among provided dependencies first, then resources,
//! then modules. Within a container, properties shadow parameters.
//!
//! A referenced map or list is substituted as its JSON text. Placeholders
//! escaped inside it stay escaped exactly once, so they survive later passes
//! and unescape to valid JSON.
//!
//! Properties of required dependencies are never referenced by others. They
//! are resolved last, with the scoped pattern, so `${key}` inside them refers
//! to the required dependency.

use crate::error::{ResolutionError, Result};
use crate::pattern::{Reference, ReferencePattern, ESCAPE_CHAR};
use crate::visitor::try_visit;
use mta_model::properties::to_text;
use mta_model::{DeploymentDescriptor, Properties, PropertyTypes, RequiredDependency};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

/// Result of a resolution pass that skipped some dependencies
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResolution {
    pub descriptor: DeploymentDescriptor,
    /// Dependency names whose references were left in place
    pub unresolved: BTreeSet<String>,
}

/// Resolve every reference, failing on any that cannot be resolved
#[instrument(skip_all, fields(mta = %descriptor.id))]
pub fn resolve_full(descriptor: &DeploymentDescriptor) -> Result<DeploymentDescriptor> {
    let ignored = BTreeSet::new();
    let resolution = ReferenceResolver::new(descriptor, &ignored).resolve()?;
    debug!("Resolved all references");
    Ok(resolution.descriptor)
}

/// Resolve every reference except those to `ignored` dependency names
#[instrument(skip_all, fields(mta = %descriptor.id, ignored = ignored.len()))]
pub fn resolve_partial(
    descriptor: &DeploymentDescriptor,
    ignored: &BTreeSet<String>,
) -> Result<PartialResolution> {
    let resolution = ReferenceResolver::new(descriptor, ignored).resolve()?;
    debug!(unresolved = ?resolution.unresolved, "Resolved references partially");
    Ok(resolution)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeId {
    Module(usize),
    Provided(usize, usize),
    Resource(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Parameters,
    Properties,
}

/// One top-level value of a container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Slot {
    node: NodeId,
    section: Section,
    key: String,
}

#[derive(Debug)]
enum SlotState {
    Resolving,
    Resolved(Value),
}

#[derive(Debug, Clone)]
struct Container {
    parameters: Properties,
    properties: Properties,
}

/// Single-use resolver over one descriptor
pub struct ReferenceResolver<'a> {
    descriptor: &'a DeploymentDescriptor,
    ignored: &'a BTreeSet<String>,
    states: HashMap<Slot, SlotState>,
    stack: Vec<Slot>,
    unresolved: BTreeSet<String>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(descriptor: &'a DeploymentDescriptor, ignored: &'a BTreeSet<String>) -> Self {
        Self {
            descriptor,
            ignored,
            states: HashMap::new(),
            stack: Vec::new(),
            unresolved: BTreeSet::new(),
        }
    }

    /// Produce a copy of the descriptor with references substituted
    pub fn resolve(mut self) -> Result<PartialResolution> {
        let descriptor = self.descriptor;
        descriptor.validate()?;
        let fully_qualified = ReferencePattern::FullyQualified;
        let mut result = descriptor.clone();

        result.parameters =
            self.resolve_properties(&descriptor.id, &descriptor.parameters, &fully_qualified)?;

        for (i, module) in descriptor.modules.iter().enumerate() {
            let container = self.container(NodeId::Module(i))?;
            let target = &mut result.modules[i];
            target.parameters = container.parameters;
            target.properties = container.properties;

            for j in 0..module.provides.len() {
                let container = self.container(NodeId::Provided(i, j))?;
                let target = &mut result.modules[i].provides[j];
                target.parameters = container.parameters;
                target.properties = container.properties;
            }

            result.modules[i].requires = self.resolve_required(&module.name, &module.requires)?;
        }

        for (i, resource) in descriptor.resources.iter().enumerate() {
            let container = self.container(NodeId::Resource(i))?;
            let target = &mut result.resources[i];
            target.parameters = container.parameters;
            target.properties = container.properties;

            result.resources[i].requires =
                self.resolve_required(&resource.name, &resource.requires)?;
        }

        Ok(PartialResolution {
            descriptor: result,
            unresolved: self.unresolved,
        })
    }

    fn resolve_required(
        &mut self,
        owner: &str,
        dependencies: &[RequiredDependency],
    ) -> Result<Vec<RequiredDependency>> {
        dependencies
            .iter()
            .map(|dependency| -> Result<RequiredDependency> {
                let scoped = ReferencePattern::scoped(&dependency.name);
                Ok(RequiredDependency {
                    parameters: self.resolve_properties(owner, &dependency.parameters, &scoped)?,
                    properties: self.resolve_properties(owner, &dependency.properties, &scoped)?,
                    ..dependency.clone()
                })
            })
            .collect()
    }

    fn container(&mut self, node: NodeId) -> Result<Container> {
        let (parameters, properties) = self.source(node);
        Ok(Container {
            parameters: self.resolve_section(node, Section::Parameters, parameters)?,
            properties: self.resolve_section(node, Section::Properties, properties)?,
        })
    }

    fn resolve_section(
        &mut self,
        node: NodeId,
        section: Section,
        source: &Properties,
    ) -> Result<Properties> {
        source
            .keys()
            .map(|key| -> Result<(String, Value)> {
                let slot = Slot {
                    node,
                    section,
                    key: key.clone(),
                };
                Ok((key.clone(), self.resolve_slot(slot)?))
            })
            .collect()
    }

    fn resolve_slot(&mut self, slot: Slot) -> Result<Value> {
        match self.states.get(&slot) {
            Some(SlotState::Resolved(value)) => return Ok(value.clone()),
            Some(SlotState::Resolving) => return Err(self.cycle_through(&slot)),
            None => {}
        }

        self.states.insert(slot.clone(), SlotState::Resolving);
        self.stack.push(slot.clone());

        let owner = self.node_name(slot.node);
        let (parameters, properties) = self.source(slot.node);
        let source = match slot.section {
            Section::Parameters => parameters,
            Section::Properties => properties,
        };
        let single: Properties = source
            .get(&slot.key)
            .map(|value| (slot.key.clone(), value.clone()))
            .into_iter()
            .collect();
        let mut resolved =
            self.resolve_properties(owner, &single, &ReferencePattern::FullyQualified)?;
        let value = resolved.remove(&slot.key).unwrap_or(Value::Null);

        self.stack.pop();
        self.states.insert(slot, SlotState::Resolved(value.clone()));
        Ok(value)
    }

    fn resolve_properties(
        &mut self,
        owner: &str,
        properties: &Properties,
        pattern: &ReferencePattern,
    ) -> Result<Properties> {
        try_visit::<ResolutionError, _>(properties, &mut |key, text| {
            let (text, _) =
                pattern.try_replace(text, |reference| self.lookup(owner, key, reference))?;
            Ok(Value::String(text))
        })
    }

    fn lookup(&mut self, owner: &str, property: &str, reference: &Reference) -> Result<Option<String>> {
        if self.ignored.contains(&reference.dependency) {
            self.unresolved.insert(reference.dependency.clone());
            return Ok(None);
        }

        let unresolved = || ResolutionError::UnresolvedReference {
            dependency: reference.dependency.clone(),
            key: reference.key.clone(),
            owner: owner.to_string(),
            property: property.to_string(),
        };

        let node = self.find_node(&reference.dependency).ok_or_else(unresolved)?;
        let (parameters, properties) = self.source(node);
        let section = if properties.contains_key(&reference.key) {
            Section::Properties
        } else if parameters.contains_key(&reference.key) {
            Section::Parameters
        } else {
            return Err(unresolved());
        };
        let value = self.resolve_slot(Slot {
            node,
            section,
            key: reference.key.clone(),
        })?;
        Ok(Some(substitution(&value)))
    }

    fn find_node(&self, name: &str) -> Option<NodeId> {
        let descriptor = self.descriptor;
        let provided = descriptor.modules.iter().enumerate().find_map(|(i, module)| {
            module
                .provides
                .iter()
                .position(|p| p.name == name)
                .map(|j| NodeId::Provided(i, j))
        });
        provided
            .or_else(|| {
                descriptor
                    .resources
                    .iter()
                    .position(|r| r.name == name)
                    .map(NodeId::Resource)
            })
            .or_else(|| {
                descriptor
                    .modules
                    .iter()
                    .position(|m| m.name == name)
                    .map(NodeId::Module)
            })
    }

    fn node_name(&self, node: NodeId) -> &'a str {
        let descriptor = self.descriptor;
        match node {
            NodeId::Module(i) => &descriptor.modules[i].name,
            NodeId::Provided(i, j) => &descriptor.modules[i].provides[j].name,
            NodeId::Resource(i) => &descriptor.resources[i].name,
        }
    }

    fn source(&self, node: NodeId) -> (&'a Properties, &'a Properties) {
        let descriptor = self.descriptor;
        match node {
            NodeId::Module(i) => {
                let module = &descriptor.modules[i];
                (&module.parameters, &module.properties)
            }
            NodeId::Provided(i, j) => {
                let provided = &descriptor.modules[i].provides[j];
                (&provided.parameters, &provided.properties)
            }
            NodeId::Resource(i) => {
                let resource = &descriptor.resources[i];
                (&resource.parameters, &resource.properties)
            }
        }
    }

    fn cycle_through(&self, slot: &Slot) -> ResolutionError {
        let start = self.stack.iter().position(|s| s == slot).unwrap_or(0);
        let mut cycle: Vec<String> = self.stack[start..]
            .iter()
            .map(|s| self.node_name(s.node).to_string())
            .collect();
        cycle.push(self.node_name(slot.node).to_string());
        ResolutionError::CyclicReference { cycle }
    }
}

/// Text substituted for a referenced value
fn substitution(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => structured_text(other),
    }
}

/// JSON text of a map or list. JSON doubles every escape character, so a
/// run of `2n` before a placeholder marker is shortened by one when `n` is
/// odd: escaped placeholders stay escaped, live ones stay live.
fn structured_text(value: &Value) -> String {
    let json = to_text(value);
    let mut output = String::with_capacity(json.len());
    let mut run = 0usize;
    for c in json.chars() {
        if c == ESCAPE_CHAR {
            run += 1;
            continue;
        }
        if c == '$' && (run / 2) % 2 == 1 {
            run -= 1;
        }
        output.extend(std::iter::repeat(ESCAPE_CHAR).take(run));
        output.push(c);
        run = 0;
    }
    output.extend(std::iter::repeat(ESCAPE_CHAR).take(run));
    output
}

/// Convert properties with a declared datatype into values of that type
pub fn apply_property_types(descriptor: &DeploymentDescriptor) -> Result<DeploymentDescriptor> {
    let mut result = descriptor.clone();
    for module in &mut result.modules {
        convert_typed(&mut module.properties, &module.property_types)?;
    }
    for resource in &mut result.resources {
        convert_typed(&mut resource.properties, &resource.property_types)?;
    }
    Ok(result)
}

fn convert_typed(properties: &mut Properties, types: &PropertyTypes) -> Result<()> {
    for (key, ty) in types {
        if let Some(value) = properties.get_mut(key) {
            *value = ty.convert(key, value)?;
        }
    }
    Ok(())
}
