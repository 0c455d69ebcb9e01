use crate::dom::DomTree;
use crate::layout::{property, LayoutElement, PropertyValue};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
}

impl DocumentMetadata {
    pub fn from_tree(tree: &DomTree) -> Self {
        let mut meta = DocumentMetadata::default();
        if let Some(title) = tree.find_first("title") {
            let text = tree
                .text_content(title)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                meta.title = Some(text);
            }
        }
        for node in tree.find_all("meta") {
            let Some(el) = tree.element(node) else {
                continue;
            };
            let (Some(name), Some(content)) = (el.attr("name"), el.attr("content")) else {
                continue;
            };
            let content = content.trim().to_string();
            match name.to_ascii_lowercase().as_str() {
                "author" => meta.author = Some(content),
                "description" | "subject" => meta.subject = Some(content),
                "keywords" => meta.keywords = Some(content),
                "generator" => meta.creator = Some(content),
                _ => {}
            }
        }
        meta.language = tree
            .document_element()
            .and_then(|html| tree.attr(html, "lang"))
            .map(str::to_string);
        meta
    }

    pub fn merged_with(&self, overrides: &DocumentMetadata) -> DocumentMetadata {
        DocumentMetadata {
            title: overrides.title.clone().or_else(|| self.title.clone()),
            author: overrides.author.clone().or_else(|| self.author.clone()),
            subject: overrides.subject.clone().or_else(|| self.subject.clone()),
            keywords: overrides.keywords.clone().or_else(|| self.keywords.clone()),
            creator: overrides.creator.clone().or_else(|| self.creator.clone()),
            language: overrides.language.clone().or_else(|| self.language.clone()),
        }
    }

    pub fn stamp(&self, element: &mut LayoutElement) {
        for (id, value) in [
            (property::META_TITLE, &self.title),
            (property::META_AUTHOR, &self.author),
            (property::META_SUBJECT, &self.subject),
            (property::META_KEYWORDS, &self.keywords),
            (property::META_CREATOR, &self.creator),
            (property::META_LANGUAGE, &self.language),
        ] {
            if let Some(value) = value {
                element.props.set(id, PropertyValue::Text(value.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutKind;

    #[test]
    fn head_fields_are_collected() {
        let tree = DomTree::parse_html(
            r#"<html lang="en"><head><title> Annual
            Report </title><meta name="author" content="Ops Team"><meta name="keywords" content="a, b"></head><body></body></html>"#,
        );
        let meta = DocumentMetadata::from_tree(&tree);
        assert_eq!(meta.title.as_deref(), Some("Annual Report"));
        assert_eq!(meta.author.as_deref(), Some("Ops Team"));
        assert_eq!(meta.keywords.as_deref(), Some("a, b"));
        assert_eq!(meta.language.as_deref(), Some("en"));
    }

    #[test]
    fn overrides_win_and_stamp() {
        let found = DocumentMetadata {
            title: Some("From head".to_string()),
            author: Some("Head author".to_string()),
            ..DocumentMetadata::default()
        };
        let overrides = DocumentMetadata {
            title: Some("Override".to_string()),
            ..DocumentMetadata::default()
        };
        let merged = found.merged_with(&overrides);
        assert_eq!(merged.title.as_deref(), Some("Override"));
        assert_eq!(merged.author.as_deref(), Some("Head author"));
        let mut root = LayoutElement::new(LayoutKind::Block);
        merged.stamp(&mut root);
        assert_eq!(root.props.text(property::META_TITLE), Some("Override"));
        assert_eq!(root.props.text(property::META_SUBJECT), None);
    }
}
