//! Element descriptions: the immutable input of a render pass.
//!
//! An [`Element`] describes what a position in the tree should look like.
//! Components return elements, the root is rendered with one, and child
//! reconciliation compares them against the fibers of the previous pass.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::HookError;
use crate::hash::hash_one;

pub type Key = u64;

pub type RenderResult = Result<Element, HookError>;

pub type RenderFn = fn(&Props) -> RenderResult;

/// Identity of a function component.
///
/// Two component types are the same when both the name and the render
/// function pointer match; a fiber is only reused for an element of the
/// same type.
#[derive(Clone, Copy)]
pub struct ComponentType {
    name: &'static str,
    render: RenderFn,
}

impl ComponentType {
    pub const fn new(name: &'static str, render: RenderFn) -> Self {
        Self { name, render }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props) -> RenderResult {
        (self.render)(props)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.render as usize == other.render as usize
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Host(Rc<str>),
    Component(ComponentType),
    Fragment,
}

impl ElementType {
    pub fn name(&self) -> &str {
        match self {
            ElementType::Host(tag) => tag,
            ElementType::Component(component) => component.name(),
            ElementType::Fragment => "Fragment",
        }
    }
}

#[derive(Clone)]
pub struct Callback(Rc<dyn Fn()>);

impl Callback {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Callback(Callback),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(value) => Some(*value),
            PropValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            PropValue::Callback(callback) => Some(callback),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(value) => f.write_str(value),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Callback(_) => f.write_str("<callback>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<Callback> for PropValue {
    fn from(value: Callback) -> Self {
        PropValue::Callback(value)
    }
}

/// One changed attribute. `value == None` means the attribute was removed.
#[derive(Clone, Debug, PartialEq)]
pub struct PropChange {
    pub name: Rc<str>,
    pub value: Option<PropValue>,
}

#[derive(Default, Debug)]
struct PropsData {
    attributes: IndexMap<Rc<str>, PropValue>,
    children: Element,
}

/// Attributes plus children. Cloning is a reference-count bump.
#[derive(Clone, Default, Debug)]
pub struct Props {
    inner: Rc<PropsData>,
}

impl Props {
    pub fn new(attributes: IndexMap<Rc<str>, PropValue>, children: Element) -> Self {
        Self {
            inner: Rc::new(PropsData {
                attributes,
                children,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.inner.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn get_callback(&self, name: &str) -> Option<&Callback> {
        self.get(name).and_then(PropValue::as_callback)
    }

    pub fn children(&self) -> &Element {
        &self.inner.children
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.inner
            .attributes
            .iter()
            .map(|(name, value)| (name.as_ref(), value))
    }

    pub fn ptr_eq(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attribute changes needed to go from `self` to `next`. Children are
    /// not attributes and never show up here.
    pub fn diff_attributes(&self, next: &Props) -> Vec<PropChange> {
        if self.ptr_eq(next) {
            return Vec::new();
        }
        let mut changes = Vec::new();
        for name in self.inner.attributes.keys() {
            if !next.inner.attributes.contains_key(name) {
                changes.push(PropChange {
                    name: name.clone(),
                    value: None,
                });
            }
        }
        for (name, value) in &next.inner.attributes {
            if self.inner.attributes.get(name) != Some(value) {
                changes.push(PropChange {
                    name: name.clone(),
                    value: Some(value.clone()),
                });
            }
        }
        changes
    }
}

#[derive(Clone, Debug)]
pub struct ElementNode {
    pub element_type: ElementType,
    pub key: Option<Key>,
    pub props: Props,
}

/// Description of a tree position: nothing, a text leaf, a typed node, or a
/// list of siblings.
#[derive(Clone, Default, Debug)]
pub enum Element {
    #[default]
    Empty,
    Text(Rc<str>),
    Node(Rc<ElementNode>),
    List(Rc<[Element]>),
}

impl Element {
    pub fn key(&self) -> Option<Key> {
        match self {
            Element::Node(node) => node.key,
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Element::Empty)
    }
}

impl From<ElementBuilder> for Element {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Text(Rc::from(value))
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::Text(Rc::from(value))
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::from(value.to_string())
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        Element::from(value.to_string())
    }
}

impl From<Vec<Element>> for Element {
    fn from(children: Vec<Element>) -> Self {
        Element::List(Rc::from(children))
    }
}

impl<T: Into<Element>> From<Option<T>> for Element {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<Key>,
    attributes: IndexMap<Rc<str>, PropValue>,
    children: Vec<Element>,
}

impl ElementBuilder {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn key<K: Hash + ?Sized>(mut self, key: &K) -> Self {
        self.key = Some(hash_one(key));
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.attributes.insert(Rc::from(name), value.into());
        self
    }

    pub fn on(self, name: &str, handler: impl Fn() + 'static) -> Self {
        self.prop(name, Callback::new(handler))
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Element {
        let children = match self.children.len() {
            0 => Element::Empty,
            1 => self.children.into_iter().next().unwrap_or_default(),
            _ => Element::List(Rc::from(self.children)),
        };
        Element::Node(Rc::new(ElementNode {
            element_type: self.element_type,
            key: self.key,
            props: Props::new(self.attributes, children),
        }))
    }
}

pub fn element(tag: &str) -> ElementBuilder {
    ElementBuilder::new(ElementType::Host(Rc::from(tag)))
}

pub fn component(component: ComponentType) -> ElementBuilder {
    ElementBuilder::new(ElementType::Component(component))
}

/// Fragment builder; add `.key(..)` to make it a diffable child of its own.
pub fn fragment_builder() -> ElementBuilder {
    ElementBuilder::new(ElementType::Fragment)
}

pub fn fragment<I>(children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    fragment_builder().children(children).build()
}

pub fn text(content: impl Into<Rc<str>>) -> Element {
    Element::Text(content.into())
}

pub fn list<I>(children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    Element::List(children.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(_props: &Props) -> RenderResult {
        Ok(Element::Empty)
    }

    fn other_leaf(_props: &Props) -> RenderResult {
        Ok(text("other"))
    }

    #[test]
    fn single_child_is_stored_without_list() {
        let el = element("div").child("hello").build();
        let Element::Node(node) = el else {
            panic!("expected node");
        };
        assert!(matches!(node.props.children(), Element::Text(text) if &**text == "hello"));
    }

    #[test]
    fn several_children_become_a_list() {
        let el = element("ul")
            .children((0..3).map(|i| element("li").key(&i)))
            .build();
        let Element::Node(node) = el else {
            panic!("expected node");
        };
        let Element::List(items) = node.props.children() else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].key(), Some(hash_one(&1)));
    }

    #[test]
    fn attribute_diff_reports_changes_and_removals() {
        let Element::Node(old) = element("div").prop("id", "a").prop("title", "t").build() else {
            unreachable!()
        };
        let Element::Node(new) = element("div").prop("id", "b").prop("lang", "en").build() else {
            unreachable!()
        };
        let changes = old.props.diff_attributes(&new.props);
        assert_eq!(
            changes,
            vec![
                PropChange {
                    name: Rc::from("title"),
                    value: None
                },
                PropChange {
                    name: Rc::from("id"),
                    value: Some(PropValue::from("b"))
                },
                PropChange {
                    name: Rc::from("lang"),
                    value: Some(PropValue::from("en"))
                },
            ]
        );
    }

    #[test]
    fn identical_attributes_produce_no_changes() {
        let callback = Callback::new(|| {});
        let build = || {
            element("button")
                .prop("label", "go")
                .prop("on_click", callback.clone())
                .build()
        };
        let (Element::Node(a), Element::Node(b)) = (build(), build()) else {
            unreachable!()
        };
        assert!(a.props.diff_attributes(&b.props).is_empty());
    }

    #[test]
    fn component_identity_uses_name_and_function() {
        let a = ComponentType::new("Leaf", leaf);
        let b = ComponentType::new("Leaf", leaf);
        let c = ComponentType::new("Other", other_leaf);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
