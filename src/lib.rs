//! Multilingual content resolution core.
//!
//! Lets a single content repository serve the same logical content in
//! multiple languages: a registry of language entities backed by a generic
//! tag-storage substrate, a bidirectional translation-linking graph between
//! content objects, weighted content negotiation against client preferences,
//! a family of URL scheme codecs, a per-request language resolver, and a
//! query translator that keeps repository queries inside the resolved
//! language.
//!
//! # Architecture
//!
//! - `store`: the tagging-substrate contract, the core's only persistence
//! - `registry`: configured languages, cached and validated
//! - `translations`: language assignments and translation groups
//! - `negotiation`: `Accept-Language` parsing and cookie/header preference
//! - `scheme`: the four URL scheme codecs
//! - `resolver`: the once-per-request resolution state machine
//! - `query`: rewriting repository queries into the resolved language
//! - `http`: axum middleware gluing the resolver into a request lifecycle

pub mod config;
pub mod error;
pub mod http;
pub mod negotiation;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod scheme;
pub mod store;
pub mod translations;

pub use config::{ResolveStrategyKind, Settings, UrlSchemeKind};
pub use error::{Error, Result, ValidationError};
pub use negotiation::{find_best_match, get_preferred, parse_accept_language, Preferred};
pub use query::{QueryDescription, QueryTranslator, SlugIndex, TagFilterNode};
pub use registry::{Language, LanguageRegistry, LanguageSpec};
pub use resolver::{
    ContentFacts, LanguageResolver, RequestFacts, Resolution, ResolutionContext, ResolutionState,
};
pub use scheme::{switcher, SwitcherEntry, UrlScheme};
pub use store::{MemoryTagStore, TagRow, TagStore};
pub use translations::{ContentCatalog, TranslationGraph};
