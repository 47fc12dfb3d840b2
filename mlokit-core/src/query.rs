//! Element lookup helpers
//!
//! `xmltree` only exposes direct-child lookups, while archetype files are
//! addressed by descendant paths such as `.//rooms/Item`. These helpers walk
//! the tree in document order so first-match semantics stay predictable.

use xmltree::{Element, XMLNode};

/// Iterate the element children of `el`, skipping text and comments
pub fn child_elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Iterate the element children of `el` whose tag is `name`
pub fn children_named<'a>(el: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    child_elements(el).filter(move |child| child.name == name)
}

/// Trimmed text of the first `name` child, if it has any
pub fn child_text(el: &Element, name: &str) -> Option<String> {
    el.get_child(name)
        .and_then(|child| child.get_text())
        .map(|text| text.trim().to_string())
}

/// All descendants of `root` (excluding `root` itself) in document order
pub fn descendants(root: &Element) -> Vec<&Element> {
    let mut out = Vec::new();
    collect_descendants(root, &mut out);
    out
}

fn collect_descendants<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
    for child in child_elements(el) {
        out.push(child);
        collect_descendants(child, out);
    }
}

/// Resolve a descendant path the way `.//a/b/c` does
///
/// The first segment matches at any depth below `root`; each following
/// segment matches direct children of the previous match.
pub fn find_all<'a>(root: &'a Element, path: &[&'a str]) -> Vec<&'a Element> {
    let Some((head, rest)) = path.split_first() else {
        return Vec::new();
    };

    let mut current: Vec<&Element> = descendants(root)
        .into_iter()
        .filter(|el| el.name == *head)
        .collect();

    for &segment in rest {
        current = current
            .into_iter()
            .flat_map(|el| children_named(el, segment))
            .collect();
    }

    current
}

/// Child-index route from `root` to the first element matching `path` and `pred`
///
/// Routes let callers take a mutable borrow after an immutable search.
pub fn locate<F>(root: &Element, path: &[&str], pred: F) -> Option<Vec<usize>>
where
    F: Fn(&Element) -> bool,
{
    let (head, rest) = path.split_first()?;
    let mut route = Vec::new();
    locate_from(root, head, rest, &pred, &mut route).then_some(route)
}

fn locate_from<F>(el: &Element, head: &str, rest: &[&str], pred: &F, route: &mut Vec<usize>) -> bool
where
    F: Fn(&Element) -> bool,
{
    for (idx, node) in el.children.iter().enumerate() {
        let XMLNode::Element(child) = node else {
            continue;
        };
        route.push(idx);
        if child.name == head && locate_below(child, rest, pred, route) {
            return true;
        }
        if locate_from(child, head, rest, pred, route) {
            return true;
        }
        route.pop();
    }
    false
}

fn locate_below<F>(el: &Element, rest: &[&str], pred: &F, route: &mut Vec<usize>) -> bool
where
    F: Fn(&Element) -> bool,
{
    let Some((segment, tail)) = rest.split_first() else {
        return pred(el);
    };

    for (idx, node) in el.children.iter().enumerate() {
        let XMLNode::Element(child) = node else {
            continue;
        };
        if child.name != *segment {
            continue;
        }
        route.push(idx);
        if locate_below(child, tail, pred, route) {
            return true;
        }
        route.pop();
    }
    false
}

/// Follow a route produced by [`locate`]
pub fn element_at_mut<'a>(root: &'a mut Element, route: &[usize]) -> Option<&'a mut Element> {
    let mut current = root;
    for &idx in route {
        current = match current.children.get_mut(idx)? {
            XMLNode::Element(child) => child,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <CMapTypes>
          <archetypes>
            <Item type="CMloArchetypeDef">
              <name>int_saloon</name>
              <rooms>
                <Item><name>limbo</name></Item>
                <Item><name>bar</name></Item>
                <Item><name>bar</name><marker/></Item>
              </rooms>
            </Item>
          </archetypes>
        </CMapTypes>"#;

    fn sample() -> Element {
        Element::parse(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_find_all_descendant_path() {
        let root = sample();
        let rooms = find_all(&root, &["rooms", "Item"]);
        assert_eq!(rooms.len(), 3);
        assert_eq!(child_text(rooms[1], "name").as_deref(), Some("bar"));
    }

    #[test]
    fn test_find_all_with_runtime_path() {
        let root = sample();
        let segments: Vec<String> = vec!["rooms".to_string(), "Item".to_string(), "name".to_string()];
        let path: Vec<&str> = segments.iter().map(String::as_str).collect();

        let names: Vec<String> = find_all(&root, &path)
            .into_iter()
            .filter_map(|el| el.get_text().map(|t| t.to_string()))
            .collect();
        assert_eq!(names, vec!["limbo", "bar", "bar"]);
    }

    #[test]
    fn test_find_all_missing_segment() {
        let root = sample();
        assert!(find_all(&root, &["rooms", "Entity"]).is_empty());
        assert!(find_all(&root, &[]).is_empty());
    }

    #[test]
    fn test_locate_returns_first_match() {
        let mut root = sample();
        let route = locate(&root, &["rooms", "Item"], |el| {
            child_text(el, "name").as_deref() == Some("bar")
        })
        .unwrap();

        let room = element_at_mut(&mut root, &route).unwrap();
        assert!(room.get_child("marker").is_none());
        room.children.push(XMLNode::Element(Element::new("touched")));

        let rooms = find_all(&root, &["rooms", "Item"]);
        assert!(rooms[1].get_child("touched").is_some());
        assert!(rooms[2].get_child("touched").is_none());
    }

    #[test]
    fn test_locate_no_match() {
        let root = sample();
        let route = locate(&root, &["rooms", "Item"], |el| {
            child_text(el, "name").as_deref() == Some("cellar")
        });
        assert!(route.is_none());
    }
}
