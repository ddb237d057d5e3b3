//! Minimal element model used by the components to describe what they render.
//!
//! A browser host turns `Element`s into real DOM nodes; native callers keep
//! them in an `ElementList`.

use std::collections::BTreeMap;

use serde::Serialize;

/// A detached element: tag, text content, class list and `data-*` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub tag: String,
    pub text_content: String,
    pub class_list: Vec<String>,
    pub dataset: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_string(),
            text_content: String::new(),
            class_list: Vec::new(),
            dataset: BTreeMap::new(),
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    /// Add a class; duplicates are ignored like `DOMTokenList.add`.
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.class_list.push(class.to_string());
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list.iter().any(|c| c == class)
    }

    pub fn set_data(&mut self, key: &str, value: impl ToString) {
        self.dataset.insert(key.to_string(), value.to_string());
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.dataset.get(key).map(String::as_str)
    }
}

/// The content of a `<template>`: its first element child is cloned per instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    first_element_child: Element,
}

impl Template {
    pub fn new(first_element_child: Element) -> Self {
        Template { first_element_child }
    }

    /// Deep-clone the template's first child.
    pub fn instantiate(&self) -> Element {
        self.first_element_child.clone()
    }
}

/// Something rendered elements can be appended to.
pub trait Container {
    fn append_child(&mut self, element: Element);

    fn focus(&mut self) {}
}

/// An in-memory container that records appended children in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElementList {
    children: Vec<Element>,
    #[serde(skip)]
    focused: bool,
}

impl ElementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

impl Container for ElementList {
    fn append_child(&mut self, element: Element) {
        self.children.push(element);
    }

    fn focus(&mut self) {
        self.focused = true;
    }
}
