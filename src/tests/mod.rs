// symfact test infrastructure
//
// Integration-style tests over real PHP and Twig snippets. Unit tests for a
// single module live next to the module; the suites here exercise several
// modules together the way the project facade and CLI use them.

use crate::extractors::base::PhpSource;
use crate::workspace::PhpWorkspace;

// ============================================================================
// FACT EXTRACTION TESTS
// ============================================================================
pub mod event_subscriber_tests; // getSubscribedEvents maps, targets and event names

// ============================================================================
// PROJECT TESTS - loading from disk, configuration, caching
// ============================================================================
pub mod project_tests;

/// Parse `(path, code)` pairs into a workspace with the default test markers
pub fn workspace_from(files: &[(&str, &str)]) -> PhpWorkspace {
    let sources = files
        .iter()
        .map(|(path, code)| PhpSource::parse(*path, *code).unwrap())
        .collect();
    PhpWorkspace::from_sources(
        sources,
        crate::config::EventConfig::default().test_namespace_markers,
    )
}
