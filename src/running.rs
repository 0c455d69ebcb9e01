use crate::dom::OccurrencePolicy;
use crate::layout::LayoutElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunningId(usize);

impl RunningId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub page: usize,
    pub first_on_page: bool,
}

#[derive(Debug, Clone)]
pub struct RunningContainer {
    pub name: String,
    pub element: LayoutElement,
    occurrence: Option<Occurrence>,
}

impl RunningContainer {
    pub fn occurrence(&self) -> Option<Occurrence> {
        self.occurrence
    }
}

#[derive(Debug, Clone)]
struct NamedString {
    name: String,
    value: String,
    occurrence: Occurrence,
}

// Arena of running-element containers and `string-set` assignments for one
// layout pass. Flow keeps only `RunningId` keys.
#[derive(Debug, Default)]
pub struct RunningRegistry {
    containers: Vec<RunningContainer>,
    strings: Vec<NamedString>,
}

impl RunningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.containers.clear();
        self.strings.clear();
    }

    pub fn register(&mut self, name: &str, element: LayoutElement) -> RunningId {
        let id = RunningId(self.containers.len());
        log::debug!("running element '{name}' registered as #{}", id.0);
        self.containers.push(RunningContainer {
            name: name.to_string(),
            element,
            occurrence: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn container(&self, id: RunningId) -> Option<&RunningContainer> {
        self.containers.get(id.0)
    }

    pub fn record_occurrence(&mut self, id: RunningId, page: usize, first_on_page: bool) {
        if let Some(container) = self.containers.get_mut(id.0) {
            if container.occurrence.is_none() {
                container.occurrence = Some(Occurrence {
                    page,
                    first_on_page,
                });
            }
        }
    }

    pub fn clear_occurrences(&mut self) {
        for container in &mut self.containers {
            container.occurrence = None;
        }
        self.strings.clear();
    }

    pub fn record_string(&mut self, name: &str, value: &str, page: usize, first_on_page: bool) {
        self.strings.push(NamedString {
            name: name.to_string(),
            value: value.to_string(),
            occurrence: Occurrence {
                page,
                first_on_page,
            },
        });
    }

    pub fn select(&self, name: &str, page: usize, policy: OccurrencePolicy) -> Option<&LayoutElement> {
        let entries: Vec<(Occurrence, &LayoutElement)> = self
            .containers
            .iter()
            .filter(|container| container.name == name)
            .filter_map(|container| container.occurrence.map(|occ| (occ, &container.element)))
            .collect();
        pick(&entries, page, policy).copied()
    }

    pub fn select_string(&self, name: &str, page: usize, policy: OccurrencePolicy) -> Option<&str> {
        let entries: Vec<(Occurrence, &str)> = self
            .strings
            .iter()
            .filter(|entry| entry.name == name)
            .map(|entry| (entry.occurrence, entry.value.as_str()))
            .collect();
        pick(&entries, page, policy).copied()
    }
}

fn pick<T>(entries: &[(Occurrence, T)], page: usize, policy: OccurrencePolicy) -> Option<&T> {
    let on_page: Vec<&(Occurrence, T)> = entries.iter().filter(|(occ, _)| occ.page == page).collect();
    let carried = entries
        .iter()
        .rev()
        .find(|(occ, _)| occ.page < page)
        .map(|(_, value)| value);
    match policy {
        OccurrencePolicy::First => on_page.first().map(|(_, value)| value).or(carried),
        OccurrencePolicy::Last => on_page.last().map(|(_, value)| value).or(carried),
        OccurrencePolicy::Start => match on_page.first() {
            Some((occ, value)) if occ.first_on_page => Some(value),
            _ => carried,
        },
        OccurrencePolicy::FirstExcept => {
            if on_page.is_empty() {
                carried
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutKind;

    fn text(value: &str) -> LayoutElement {
        LayoutElement::new(LayoutKind::Text(value.to_string()))
    }

    fn registry() -> RunningRegistry {
        let mut registry = RunningRegistry::new();
        let a = registry.register("header", text("A"));
        let b = registry.register("header", text("B"));
        let c = registry.register("header", text("C"));
        registry.record_occurrence(a, 0, true);
        registry.record_occurrence(b, 2, false);
        registry.record_occurrence(c, 2, false);
        registry
    }

    fn shown(registry: &RunningRegistry, page: usize, policy: OccurrencePolicy) -> Option<String> {
        registry
            .select("header", page, policy)
            .map(|element| element.text_content())
    }

    #[test]
    fn first_and_last_policies() {
        let registry = registry();
        assert_eq!(shown(&registry, 0, OccurrencePolicy::First).as_deref(), Some("A"));
        assert_eq!(shown(&registry, 1, OccurrencePolicy::First).as_deref(), Some("A"));
        assert_eq!(shown(&registry, 2, OccurrencePolicy::First).as_deref(), Some("B"));
        assert_eq!(shown(&registry, 2, OccurrencePolicy::Last).as_deref(), Some("C"));
        assert_eq!(shown(&registry, 3, OccurrencePolicy::First).as_deref(), Some("C"));
    }

    #[test]
    fn start_and_first_except_policies() {
        let registry = registry();
        assert_eq!(shown(&registry, 0, OccurrencePolicy::Start).as_deref(), Some("A"));
        assert_eq!(shown(&registry, 2, OccurrencePolicy::Start).as_deref(), Some("A"));
        assert_eq!(shown(&registry, 2, OccurrencePolicy::FirstExcept), None);
        assert_eq!(
            shown(&registry, 1, OccurrencePolicy::FirstExcept).as_deref(),
            Some("A")
        );
    }

    #[test]
    fn unplaced_containers_are_invisible() {
        let mut registry = RunningRegistry::new();
        registry.register("footer", text("F"));
        assert!(registry.select("footer", 0, OccurrencePolicy::First).is_none());
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn occurrence_binds_once() {
        let mut registry = RunningRegistry::new();
        let id = registry.register("h", text("x"));
        registry.record_occurrence(id, 1, true);
        registry.record_occurrence(id, 4, false);
        let occurrence = registry
            .container(id)
            .and_then(|c| c.occurrence())
            .expect("placed");
        assert_eq!(occurrence.page, 1);
    }

    #[test]
    fn named_strings_follow_policies() {
        let mut registry = RunningRegistry::new();
        registry.record_string("title", "One", 0, true);
        registry.record_string("title", "Two", 1, false);
        assert_eq!(registry.select_string("title", 1, OccurrencePolicy::First), Some("Two"));
        assert_eq!(registry.select_string("title", 1, OccurrencePolicy::Start), Some("One"));
        assert_eq!(registry.select_string("title", 2, OccurrencePolicy::Last), Some("Two"));
        assert_eq!(registry.select_string("other", 0, OccurrencePolicy::First), None);
    }
}
