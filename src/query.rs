//! Query translation: rewriting content-repository queries into a language.
//!
//! Every recognized object or tag reference is replaced with its equivalent
//! in the target language. References with no translation pass through
//! verbatim; a missing translation is expected steady state, not a fault,
//! and silently dropping an entry would change the query's meaning.

use crate::error::Result;
use crate::translations::TranslationGraph;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Object type used for document-like references in a query.
const POST_TYPE: &str = "post";

/// Object type used for classification-tag references in a query.
const TERM_TYPE: &str = "term";

/// Slug lookups belong to the content repository, not the graph; the
/// translator uses this collaborator when a query filters by slug.
pub trait SlugIndex: Send + Sync {
    fn object_by_slug(&self, object_type: &str, slug: &str) -> anyhow::Result<Option<i64>>;
    fn slug_of(&self, object_type: &str, id: i64) -> anyhow::Result<Option<String>>;
}

/// Boolean combinator of a tag-filter branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    And,
    Or,
}

/// One node of a nested tag-filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagFilterNode {
    /// Combines child nodes; never carries references itself
    Branch {
        op: FilterOp,
        children: Vec<TagFilterNode>,
    },
    /// Leaf term: tag ids and/or slugs for one object type
    Term {
        object_type: String,
        #[serde(default)]
        ids: Vec<i64>,
        #[serde(default)]
        slugs: Vec<String>,
    },
}

/// A content-repository query, reduced to the fields the translator
/// recognizes. Unknown fields never reach the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryDescription {
    /// Explicitly pinned language; set after translation so a query is
    /// never rewritten twice
    pub language: Option<String>,

    /// Single object id
    pub object_id: Option<i64>,

    /// Parent object id
    pub parent_id: Option<i64>,

    /// Signed id list: negative entries exclude the object
    #[serde(default)]
    pub object_ids: Vec<i64>,

    /// Comma-separated signed term id list, e.g. `"2,-3,5"`
    pub term_ids: Option<String>,

    /// Single object slug
    pub slug: Option<String>,

    /// Nested tag filter
    pub tag_filter: Option<TagFilterNode>,
}

/// Rewrites queries into a resolved language.
pub struct QueryTranslator {
    graph: Arc<TranslationGraph>,
    slugs: Option<Arc<dyn SlugIndex>>,
}

impl QueryTranslator {
    pub fn new(graph: Arc<TranslationGraph>, slugs: Option<Arc<dyn SlugIndex>>) -> Self {
        Self { graph, slugs }
    }

    /// Translate every recognized reference in `query` to `language`.
    ///
    /// Queries that already pin a language are returned untouched.
    pub fn translate(&self, query: &QueryDescription, language: &str) -> Result<QueryDescription> {
        if query.language.is_some() {
            return Ok(query.clone());
        }

        let mut out = query.clone();

        out.object_id = match query.object_id {
            Some(id) => Some(self.translate_id(POST_TYPE, id, language)?),
            None => None,
        };
        out.parent_id = match query.parent_id {
            Some(id) => Some(self.translate_id(POST_TYPE, id, language)?),
            None => None,
        };

        out.object_ids = query
            .object_ids
            .iter()
            .map(|&signed| self.translate_signed(POST_TYPE, signed, language))
            .collect::<Result<Vec<_>>>()?;

        out.term_ids = match &query.term_ids {
            Some(list) => Some(self.translate_id_list(TERM_TYPE, list, language)?),
            None => None,
        };

        out.slug = match &query.slug {
            Some(slug) => Some(self.translate_slug(POST_TYPE, slug, language)?),
            None => None,
        };

        out.tag_filter = match &query.tag_filter {
            Some(node) => Some(self.translate_node(node, language)?),
            None => None,
        };

        out.language = Some(language.to_string());
        Ok(out)
    }

    // ==================== internals ====================

    /// An id with no translation stays as it is.
    fn translate_id(&self, object_type: &str, id: i64, language: &str) -> Result<i64> {
        Ok(self
            .graph
            .get_translation(object_type, id, language)?
            .unwrap_or(id))
    }

    /// Signed ids keep their sign; only the object reference is rewritten.
    fn translate_signed(&self, object_type: &str, signed: i64, language: &str) -> Result<i64> {
        let translated = self.translate_id(object_type, signed.abs(), language)?;
        Ok(if signed < 0 { -translated } else { translated })
    }

    /// Comma-separated signed list; malformed tokens pass through verbatim
    /// and list length is always preserved.
    fn translate_id_list(&self, object_type: &str, list: &str, language: &str) -> Result<String> {
        let mut tokens = Vec::new();
        for token in list.split(',') {
            let trimmed = token.trim();
            match trimmed.parse::<i64>() {
                Ok(signed) => {
                    tokens.push(self.translate_signed(object_type, signed, language)?.to_string());
                }
                Err(_) => tokens.push(trimmed.to_string()),
            }
        }
        Ok(tokens.join(","))
    }

    fn translate_slug(&self, object_type: &str, slug: &str, language: &str) -> Result<String> {
        let Some(index) = &self.slugs else {
            return Ok(slug.to_string());
        };

        let translated = (|| -> anyhow::Result<Option<String>> {
            let Some(id) = index.object_by_slug(object_type, slug)? else {
                return Ok(None);
            };
            let Some(translated_id) = self
                .graph
                .get_translation(object_type, id, language)
                .ok()
                .flatten()
            else {
                return Ok(None);
            };
            index.slug_of(object_type, translated_id)
        })()
        .unwrap_or(None);

        Ok(translated.unwrap_or_else(|| slug.to_string()))
    }

    /// Branches keep their operator and arity; only leaf references change.
    fn translate_node(&self, node: &TagFilterNode, language: &str) -> Result<TagFilterNode> {
        match node {
            TagFilterNode::Branch { op, children } => Ok(TagFilterNode::Branch {
                op: *op,
                children: children
                    .iter()
                    .map(|child| self.translate_node(child, language))
                    .collect::<Result<Vec<_>>>()?,
            }),
            TagFilterNode::Term {
                object_type,
                ids,
                slugs,
            } => {
                let translated_ids = ids
                    .iter()
                    .map(|&signed| self.translate_signed(object_type, signed, language))
                    .collect::<Result<Vec<_>>>()?;
                let translated_slugs = slugs
                    .iter()
                    .map(|slug| self.translate_slug(object_type, slug, language))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TagFilterNode::Term {
                    object_type: object_type.clone(),
                    ids: translated_ids,
                    slugs: translated_slugs,
                })
            }
        }
    }
}
