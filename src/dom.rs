use crate::models::{ElementId, Rect};
use std::cell::RefCell;
use std::collections::BTreeMap;

pub trait Dom {
    fn by_id(&self, id: &str) -> Option<ElementId>;
    fn query_class(&self, class: &str) -> Vec<ElementId>;
    fn query_attr(&self, name: &str) -> Vec<ElementId>;

    fn tag(&self, el: ElementId) -> Option<String>;
    fn parent(&self, el: ElementId) -> Option<ElementId>;
    fn children(&self, el: ElementId) -> Vec<ElementId>;
    fn is_attached(&self, el: ElementId) -> bool;

    fn attribute(&self, el: ElementId, name: &str) -> Option<String>;
    fn set_attribute(&self, el: ElementId, name: &str, value: &str);

    fn text(&self, el: ElementId) -> String;
    fn set_text(&self, el: ElementId, text: &str);

    fn has_class(&self, el: ElementId, class: &str) -> bool;
    fn add_class(&self, el: ElementId, class: &str);
    fn remove_class(&self, el: ElementId, class: &str);
    fn set_class_name(&self, el: ElementId, classes: &str);

    fn style(&self, el: ElementId, property: &str) -> Option<String>;
    fn set_style(&self, el: ElementId, property: &str, value: &str);

    fn value(&self, el: ElementId) -> String;
    fn set_value(&self, el: ElementId, value: &str);
    fn is_disabled(&self, el: ElementId) -> bool;
    fn set_disabled(&self, el: ElementId, disabled: bool);

    fn create_element(&self, tag: &str) -> ElementId;
    fn append_child(&self, parent: ElementId, child: ElementId);
    /// Inserts `child` before `reference`; appends when `reference` is not a
    /// child of `parent`.
    fn insert_before(&self, parent: ElementId, child: ElementId, reference: ElementId);
    fn remove(&self, el: ElementId);

    /// Box relative to the viewport, `None` for detached or unlaid-out elements.
    fn bounding_rect(&self, el: ElementId) -> Option<Rect>;
    fn viewport(&self) -> Rect;
    fn scroll_y(&self) -> f64;
    fn scroll_into_view(&self, el: ElementId);

    fn has_attribute(&self, el: ElementId, name: &str) -> bool {
        self.attribute(el, name).is_some()
    }

    fn add_classes(&self, el: ElementId, classes: &str) {
        for class in classes.split_whitespace() {
            self.add_class(el, class);
        }
    }

    fn remove_classes(&self, el: ElementId, classes: &str) {
        for class in classes.split_whitespace() {
            self.remove_class(el, class);
        }
    }

    /// Returns whether the class is present afterwards.
    fn toggle_class(&self, el: ElementId, class: &str) -> bool {
        if self.has_class(el, class) {
            self.remove_class(el, class);
            false
        } else {
            self.add_class(el, class);
            true
        }
    }

    fn descendants(&self, el: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(el).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    fn next_sibling(&self, el: ElementId) -> Option<ElementId> {
        let siblings = self.children(self.parent(el)?);
        let index = siblings.iter().position(|sibling| *sibling == el)?;
        siblings.get(index + 1).copied()
    }

    fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn find_descendant_with_class(&self, el: ElementId, class: &str) -> Option<ElementId> {
        self.descendants(el)
            .into_iter()
            .find(|child| self.has_class(*child, class))
    }
}

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    styles: BTreeMap<String, String>,
    text: String,
    value: String,
    disabled: bool,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    layout: Option<Rect>,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
    viewport: Rect,
    scroll_y: f64,
}

impl Tree {
    fn node(&self, el: ElementId) -> Option<&Node> {
        self.nodes.get(el.0)
    }

    fn node_mut(&mut self, el: ElementId) -> Option<&mut Node> {
        self.nodes.get_mut(el.0)
    }

    fn attached(&self, el: ElementId) -> bool {
        let mut cursor = Some(el);
        while let Some(current) = cursor {
            if current == MemoryDom::ROOT {
                return true;
            }
            cursor = self.node(current).and_then(|node| node.parent);
        }
        false
    }

    /// `child` may move under `parent` unless that would put it inside itself.
    fn can_adopt(&self, parent: ElementId, child: ElementId) -> bool {
        if child == MemoryDom::ROOT || self.node(parent).is_none() || self.node(child).is_none() {
            return false;
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return false;
            }
            cursor = self.node(current).and_then(|node| node.parent);
        }
        true
    }

    fn document_order(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack = vec![MemoryDom::ROOT];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.node(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn detach(&mut self, el: ElementId) {
        let parent = self.node_mut(el).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|parent| self.node_mut(parent)) {
            parent.children.retain(|child| *child != el);
        }
    }
}

/// In-memory document with a scrollable viewport and explicit layout boxes.
///
/// Layout is given in document coordinates via [`MemoryDom::set_layout`];
/// [`Dom::bounding_rect`] subtracts the scroll offset like a browser would.
#[derive(Debug)]
pub struct MemoryDom {
    tree: RefCell<Tree>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

impl MemoryDom {
    pub const ROOT: ElementId = ElementId(0);

    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        let body = Node {
            tag: "body".to_string(),
            ..Node::default()
        };
        Self {
            tree: RefCell::new(Tree {
                nodes: vec![body],
                viewport: Rect::new(0.0, 0.0, viewport_width, viewport_height),
                scroll_y: 0.0,
            }),
        }
    }

    pub fn root(&self) -> ElementId {
        Self::ROOT
    }

    pub fn element(&self, parent: ElementId, tag: &str) -> ElementId {
        let el = self.create_element(tag);
        self.append_child(parent, el);
        el
    }

    pub fn element_with_id(&self, parent: ElementId, tag: &str, id: &str) -> ElementId {
        let el = self.element(parent, tag);
        self.set_attribute(el, "id", id);
        el
    }

    pub fn set_layout(&self, el: ElementId, rect: Rect) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.layout = Some(rect);
        }
    }

    pub fn scroll_to(&self, y: f64) {
        self.tree.borrow_mut().scroll_y = y.max(0.0);
    }

    pub fn resize_viewport(&self, width: f64, height: f64) {
        self.tree.borrow_mut().viewport = Rect::new(0.0, 0.0, width, height);
    }

    pub fn class_list(&self, el: ElementId) -> Vec<String> {
        self.tree
            .borrow()
            .node(el)
            .map(|node| node.classes.clone())
            .unwrap_or_default()
    }
}

impl Dom for MemoryDom {
    fn by_id(&self, id: &str) -> Option<ElementId> {
        let tree = self.tree.borrow();
        tree.document_order().into_iter().find(|el| {
            tree.node(*el)
                .and_then(|node| node.attrs.get("id"))
                .is_some_and(|value| value == id)
        })
    }

    fn query_class(&self, class: &str) -> Vec<ElementId> {
        let tree = self.tree.borrow();
        tree.document_order()
            .into_iter()
            .filter(|el| {
                tree.node(*el)
                    .is_some_and(|node| node.classes.iter().any(|c| c == class))
            })
            .collect()
    }

    fn query_attr(&self, name: &str) -> Vec<ElementId> {
        let tree = self.tree.borrow();
        tree.document_order()
            .into_iter()
            .filter(|el| tree.node(*el).is_some_and(|node| node.attrs.contains_key(name)))
            .collect()
    }

    fn tag(&self, el: ElementId) -> Option<String> {
        self.tree.borrow().node(el).map(|node| node.tag.clone())
    }

    fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.tree.borrow().node(el).and_then(|node| node.parent)
    }

    fn children(&self, el: ElementId) -> Vec<ElementId> {
        self.tree
            .borrow()
            .node(el)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn is_attached(&self, el: ElementId) -> bool {
        self.tree.borrow().attached(el)
    }

    fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
        self.tree
            .borrow()
            .node(el)
            .and_then(|node| node.attrs.get(name).cloned())
    }

    fn set_attribute(&self, el: ElementId, name: &str, value: &str) {
        let mut tree = self.tree.borrow_mut();
        if let Some(node) = tree.node_mut(el) {
            if name == "class" {
                node.classes = value.split_whitespace().map(str::to_string).collect();
            }
            if name == "value" && node.value.is_empty() {
                node.value = value.to_string();
            }
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn text(&self, el: ElementId) -> String {
        self.tree
            .borrow()
            .node(el)
            .map(|node| node.text.clone())
            .unwrap_or_default()
    }

    fn set_text(&self, el: ElementId, text: &str) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.text = text.to_string();
        }
    }

    fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.tree
            .borrow()
            .node(el)
            .is_some_and(|node| node.classes.iter().any(|c| c == class))
    }

    fn add_class(&self, el: ElementId, class: &str) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            if !node.classes.iter().any(|c| c == class) {
                node.classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&self, el: ElementId, class: &str) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.classes.retain(|c| c != class);
        }
    }

    fn set_class_name(&self, el: ElementId, classes: &str) {
        self.set_attribute(el, "class", classes);
    }

    fn style(&self, el: ElementId, property: &str) -> Option<String> {
        self.tree
            .borrow()
            .node(el)
            .and_then(|node| node.styles.get(property).cloned())
    }

    fn set_style(&self, el: ElementId, property: &str, value: &str) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn value(&self, el: ElementId) -> String {
        self.tree
            .borrow()
            .node(el)
            .map(|node| node.value.clone())
            .unwrap_or_default()
    }

    fn set_value(&self, el: ElementId, value: &str) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.value = value.to_string();
        }
    }

    fn is_disabled(&self, el: ElementId) -> bool {
        self.tree.borrow().node(el).is_some_and(|node| node.disabled)
    }

    fn set_disabled(&self, el: ElementId, disabled: bool) {
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.disabled = disabled;
        }
    }

    fn create_element(&self, tag: &str) -> ElementId {
        let mut tree = self.tree.borrow_mut();
        tree.nodes.push(Node {
            tag: tag.to_ascii_lowercase(),
            ..Node::default()
        });
        ElementId(tree.nodes.len() - 1)
    }

    fn append_child(&self, parent: ElementId, child: ElementId) {
        let mut tree = self.tree.borrow_mut();
        if !tree.can_adopt(parent, child) {
            return;
        }
        tree.detach(child);
        if let Some(node) = tree.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = tree.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn insert_before(&self, parent: ElementId, child: ElementId, reference: ElementId) {
        let mut tree = self.tree.borrow_mut();
        if !tree.can_adopt(parent, child) {
            return;
        }
        tree.detach(child);
        if let Some(node) = tree.node_mut(parent) {
            match node.children.iter().position(|c| *c == reference) {
                Some(index) => node.children.insert(index, child),
                None => node.children.push(child),
            }
        }
        if let Some(node) = tree.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn remove(&self, el: ElementId) {
        if el != Self::ROOT {
            self.tree.borrow_mut().detach(el);
        }
    }

    fn bounding_rect(&self, el: ElementId) -> Option<Rect> {
        let tree = self.tree.borrow();
        if !tree.attached(el) {
            return None;
        }
        let layout = tree.node(el)?.layout?;
        Some(Rect::new(
            layout.x,
            layout.y - tree.scroll_y,
            layout.width,
            layout.height,
        ))
    }

    fn viewport(&self) -> Rect {
        self.tree.borrow().viewport
    }

    fn scroll_y(&self) -> f64 {
        self.tree.borrow().scroll_y
    }

    fn scroll_into_view(&self, el: ElementId) {
        let mut tree = self.tree.borrow_mut();
        if !tree.attached(el) {
            return;
        }
        if let Some(layout) = tree.node(el).and_then(|node| node.layout) {
            tree.scroll_y = layout.y.max(0.0);
        }
    }
}
