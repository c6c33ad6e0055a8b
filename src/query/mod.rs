//! The query pipeline: intent analysis (C8), candidate selection (C9),
//! spreading-activation propagation (C10), and the scored subgraph builder
//! (C11) that turns a question into a ranked, explainable answer.

pub mod analyzer;
pub mod propagate;
pub mod selector;
pub mod tree;

pub use analyzer::{AnalyzerError, Intent, LlmBackedAnalyzer, Plan, QueryAnalyzer, RuleBasedAnalyzer, TemporalIntentClient, Window};
pub use propagate::{MergedActivation, PropagationResult, Propagator};
pub use selector::{select, SelectionResult, SelectionStrategy};
pub use tree::{build_query_tree, QueryTree, QueryTreeEdge, QueryTreeMeta, QueryTreeNode};
