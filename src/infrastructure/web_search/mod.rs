//! Web search provider implementations

mod tavily;

pub use tavily::{SearchDepth, TavilySearchProvider, DEFAULT_TAVILY_BASE_URL};
