//! Tests for the composition runtime
//!
//! Rendering goes through real template files in workspace-local temp
//! directories, so the locator and compiler run the same way they do in
//! production use.

use super::*;

// Test helper functions
mod helpers;


// Control flow
mod conditionals;

mod sections;


// Error and edge case tests
mod errors;
