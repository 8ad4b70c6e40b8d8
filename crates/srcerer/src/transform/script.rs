// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Script minification with the oxc toolchain.
//!
//! Sources are parsed as classic scripts. Behavior bodies end up inside the
//! registration shim's function, so a top-level `return` is accepted.

use super::ScriptMinifier;
use crate::error::{AssetKind, Result, SrcererError};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;

/// [`ScriptMinifier`] backed by `oxc_minifier` and `oxc_codegen`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcMinifier;

impl ScriptMinifier for OxcMinifier {
    fn minify(&self, source: &str) -> Result<String> {
        minify_script(source)
    }
}

/// Minifies `source`.
///
/// # Errors
///
/// [`SrcererError::Transform`] with stage [`AssetKind::Script`] when the
/// source does not parse.
pub fn minify_script(source: &str) -> Result<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(false);

    let parsed = Parser::new(&allocator, source, source_type)
        .with_options(ParseOptions {
            allow_return_outside_function: true,
            ..ParseOptions::default()
        })
        .parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(SrcererError::transform(AssetKind::Script, message));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            ..CodegenOptions::default()
        })
        .with_mangler(minified.mangler)
        .build(&program)
        .code;
    Ok(code.trim_end().to_string())
}
