//! In-memory element model.
//!
//! Holds a whole element hierarchy keyed by string ids. It backs the command
//! line front end and the tests, and suits any embedder that can materialize
//! its model up front.

use super::{ElementModel, ElementShape, TypeRef};
use crate::plan::{Plan, Progress};
use crate::TestResult;
use std::collections::HashMap;
use tracing::trace;

/// Errors raised while assembling a [`MemoryModel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Two elements share an id
    #[error("duplicate element id '{0}'")]
    DuplicateElement(String),

    /// A usage points at an id that is not in the model
    #[error("element '{from}' uses unknown element '{target}'")]
    UnknownElement {
        /// The using element
        from: String,
        /// The missing id
        target: String,
    },

    /// An element description that cannot be turned into a shape
    #[error("element '{id}': {message}")]
    Invalid {
        /// The element
        id: String,
        /// What is wrong with it
        message: String,
    },
}

/// One element and its members, used to assemble a [`MemoryModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryElement {
    id: String,
    shape: ElementShape,
    children: Vec<MemoryElement>,
    uses: Vec<String>,
    inherited: bool,
}

impl MemoryElement {
    /// An element with no members.
    pub fn new(id: impl Into<String>, shape: ElementShape) -> Self {
        Self {
            id: id.into(),
            shape,
            children: Vec::new(),
            uses: Vec::new(),
            inherited: false,
        }
    }

    /// Add a member.
    #[must_use]
    pub fn child(mut self, child: MemoryElement) -> Self {
        self.children.push(child);
        self
    }

    /// Record that this element uses the element with id `target`.
    #[must_use]
    pub fn uses(mut self, target: impl Into<String>) -> Self {
        self.uses.push(target.into());
        self
    }

    /// Mark the member as inherited.
    #[must_use]
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }
}

#[derive(Debug, Clone)]
struct Entry {
    shape: ElementShape,
    parent: Option<String>,
    children: Vec<String>,
    uses: Vec<String>,
    used_by: Vec<String>,
    inherited: bool,
}

/// Element model held entirely in memory. Element handles are the ids.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "document::ModelDocument"))]
pub struct MemoryModel {
    entries: HashMap<String, Entry>,
    roots: Vec<String>,
    // qualified type name -> id
    types: HashMap<String, String>,
}

impl MemoryModel {
    /// Assemble a model from its top-level elements.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DuplicateElement` if an id repeats and
    /// `ModelError::UnknownElement` if a usage names a missing id.
    pub fn from_roots(roots: Vec<MemoryElement>) -> Result<Self, ModelError> {
        let mut model = Self::default();
        let mut pending: Vec<(MemoryElement, Option<String>)> =
            roots.into_iter().rev().map(|root| (root, None)).collect();

        while let Some((element, parent)) = pending.pop() {
            let id = element.id;
            if model.entries.contains_key(&id) {
                return Err(ModelError::DuplicateElement(id));
            }
            match &parent {
                Some(parent) => {
                    if let Some(entry) = model.entries.get_mut(parent) {
                        entry.children.push(id.clone());
                    }
                }
                None => model.roots.push(id.clone()),
            }
            if let ElementShape::Type(shape) = &element.shape {
                let _ = model.types.entry(shape.name.clone()).or_insert_with(|| id.clone());
            }
            for child in element.children.into_iter().rev() {
                pending.push((child, Some(id.clone())));
            }
            let _ = model.entries.insert(
                id,
                Entry {
                    shape: element.shape,
                    parent,
                    children: Vec::new(),
                    uses: element.uses,
                    used_by: Vec::new(),
                    inherited: element.inherited,
                },
            );
        }

        let mut inverse: Vec<(String, String)> = Vec::new();
        for (id, entry) in &model.entries {
            for target in &entry.uses {
                if !model.entries.contains_key(target) {
                    return Err(ModelError::UnknownElement {
                        from: id.clone(),
                        target: target.clone(),
                    });
                }
                inverse.push((target.clone(), id.clone()));
            }
        }
        inverse.sort();
        for (target, user) in inverse {
            if let Some(entry) = model.entries.get_mut(&target) {
                entry.used_by.push(user);
            }
        }

        Ok(model)
    }

    /// Top-level element ids in order.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Member ids of `id` in order.
    #[must_use]
    pub fn children(&self, id: &str) -> &[String] {
        self.entries
            .get(id)
            .map_or(&[][..], |entry| entry.children.as_slice())
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the model has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drive a depth-first walk over every root, honoring `descend`.
    ///
    /// The walk is left open; call [`Progress::finish_walk`] afterwards.
    pub fn walk(&self, progress: &mut Progress<'_, Self>) {
        for root in &self.roots {
            self.walk_element(root, progress);
        }
    }

    fn walk_element(&self, id: &str, progress: &mut Progress<'_, Self>) {
        let element = id.to_string();
        let instruction = progress.start(element.clone());
        trace!(element = %id, descend = instruction.descend, result = %instruction.result, "walked element");
        if instruction.descend {
            for child in self.children(id) {
                self.walk_element(child, progress);
            }
        }
        let _ = progress.finish(&element);
    }

    /// Run `plan` over the whole model and return every element's verdict.
    #[must_use]
    pub fn evaluate(&self, plan: &Plan) -> HashMap<String, TestResult> {
        let mut progress = plan.begin(self);
        self.walk(&mut progress);
        progress.finish_walk()
    }
}

impl ElementModel for MemoryModel {
    type Element = String;

    fn shape(&self, element: &String) -> ElementShape {
        self.entries
            .get(element)
            .map_or(ElementShape::Other, |entry| entry.shape.clone())
    }

    fn enclosing(&self, element: &String) -> Option<String> {
        self.entries.get(element)?.parent.clone()
    }

    fn uses(&self, element: &String) -> Vec<String> {
        self.entries
            .get(element)
            .map(|entry| entry.uses.clone())
            .unwrap_or_default()
    }

    fn used_by(&self, element: &String) -> Vec<String> {
        self.entries
            .get(element)
            .map(|entry| entry.used_by.clone())
            .unwrap_or_default()
    }

    fn is_inherited(&self, element: &String) -> bool {
        self.entries.get(element).is_some_and(|entry| entry.inherited)
    }

    fn resolve(&self, type_ref: &TypeRef) -> Option<String> {
        self.types.get(&type_ref.name).cloned()
    }
}

#[cfg(feature = "serde")]
mod document {
    use super::{MemoryElement, MemoryModel, ModelError};
    use crate::model::{ElementShape, FieldShape, MethodShape, Modifier, TypeKind, TypeRef, TypeShape};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub(super) struct ModelDocument {
        elements: Vec<ElementDocument>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ElementDocument {
        id: String,
        kind: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        modifiers: Vec<String>,
        #[serde(default)]
        annotations: Vec<String>,
        #[serde(default)]
        superclass: Option<String>,
        #[serde(default)]
        interfaces: Vec<String>,
        #[serde(default, rename = "type")]
        field_type: Option<String>,
        #[serde(default)]
        returns: Option<String>,
        #[serde(default)]
        parameters: Vec<String>,
        #[serde(default)]
        throws: Vec<String>,
        #[serde(default)]
        uses: Vec<String>,
        #[serde(default)]
        inherited: bool,
        #[serde(default)]
        children: Vec<ElementDocument>,
    }

    fn invalid(id: &str, message: impl std::fmt::Display) -> ModelError {
        ModelError::Invalid {
            id: id.to_string(),
            message: message.to_string(),
        }
    }

    fn type_refs(id: &str, texts: &[String]) -> Result<Vec<TypeRef>, ModelError> {
        texts
            .iter()
            .map(|text| text.parse().map_err(|e| invalid(id, format!("'{text}' {e}"))))
            .collect()
    }

    fn type_ref(id: &str, text: &str) -> Result<TypeRef, ModelError> {
        text.parse().map_err(|e| invalid(id, format!("'{text}' {e}")))
    }

    impl TryFrom<ElementDocument> for MemoryElement {
        type Error = ModelError;

        fn try_from(doc: ElementDocument) -> Result<Self, Self::Error> {
            let id = doc.id;
            let name = doc.name.unwrap_or_else(|| id.clone());
            let modifiers = doc
                .modifiers
                .iter()
                .map(|m| m.parse::<Modifier>().map_err(|e| invalid(&id, e.message)))
                .collect::<Result<Vec<_>, _>>()?;
            let annotations = type_refs(&id, &doc.annotations)?;

            let type_kind = match doc.kind.as_str() {
                "class" => Some(TypeKind::Class),
                "interface" => Some(TypeKind::Interface),
                "enum" => Some(TypeKind::Enum),
                "@interface" => Some(TypeKind::Annotation),
                _ => None,
            };
            let shape = match (type_kind, doc.kind.as_str()) {
                (Some(kind), _) => ElementShape::Type(TypeShape {
                    kind,
                    name,
                    modifiers,
                    annotations,
                    superclass: doc.superclass.as_deref().map(|s| type_ref(&id, s)).transpose()?,
                    interfaces: type_refs(&id, &doc.interfaces)?,
                }),
                (None, "method") => ElementShape::Method(MethodShape {
                    name,
                    modifiers,
                    annotations,
                    return_type: type_ref(&id, doc.returns.as_deref().unwrap_or("void"))?,
                    parameters: type_refs(&id, &doc.parameters)?,
                    throws: type_refs(&id, &doc.throws)?,
                }),
                (None, "field") => {
                    let Some(field_type) = doc.field_type.as_deref() else {
                        return Err(invalid(&id, "field without a type"));
                    };
                    ElementShape::Field(FieldShape {
                        name,
                        modifiers,
                        annotations,
                        field_type: type_ref(&id, field_type)?,
                    })
                }
                (None, "other") => ElementShape::Other,
                (None, other) => return Err(invalid(&id, format!("unknown kind '{other}'"))),
            };

            let mut element = MemoryElement::new(id, shape);
            element.inherited = doc.inherited;
            element.uses = doc.uses;
            for child in doc.children {
                element.children.push(MemoryElement::try_from(child)?);
            }
            Ok(element)
        }
    }

    impl TryFrom<ModelDocument> for MemoryModel {
        type Error = ModelError;

        fn try_from(doc: ModelDocument) -> Result<Self, Self::Error> {
            let roots = doc
                .elements
                .into_iter()
                .map(MemoryElement::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            MemoryModel::from_roots(roots)
        }
    }
}
