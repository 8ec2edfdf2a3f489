//! Property-based tests for version rendering and sanitizing.
