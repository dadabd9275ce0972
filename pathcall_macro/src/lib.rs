//! Procedural macro generating RPC constructs from a `.schema` file.
//!
//! The [`schema_file!`] macro parses the interface schema and emits, for
//! each declared role, a registration-side construct tree, a call-side
//! Proxy tree, and the Server/Target transport roots wired to the
//! `pathcall_lib` runtime.

mod emit;
mod parser;
mod paths;
mod schema;

use std::{env, fs, path::PathBuf};

use proc_macro2::Span;
use quote::quote;
use syn::{parse, parse_macro_input, LitStr};

macro_rules! my_compile_error {
    ($msg:expr) => {{
        return parse::Error::new(Span::call_site(), $msg)
            .into_compile_error()
            .into();
    }};
}

/// Macro to be used as a top-level item. It will create the structs and
/// enums corresponding to the roles in the specified schema file.
///
/// Example: `schema_file!("src/something.schema");`
///
/// The path is resolved against the current working directory of the
/// compiler invocation, falling back to the crate's manifest directory.
#[proc_macro]
pub fn schema_file(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as LitStr);
    let schema_file_path = match resolve_schema_path(&input.value()) {
        Some(path) => path,
        None => my_compile_error!("Unable to find the specified schema file."),
    };
    let schema_file_contents = match fs::read_to_string(&schema_file_path) {
        Ok(s) => s,
        Err(_) => my_compile_error!("Unable to read the specified schema file."),
    };
    let schema = match parser::parse_schema(&schema_file_contents) {
        Ok((_, x)) => x,
        Err(e) => my_compile_error!(format!("Error parsing the schema file: {e}")),
    };
    let code = match emit::code_for_schema(&schema) {
        Ok(x) => x,
        Err(e) => my_compile_error!(format!("{e}")),
    };

    let path_str = match schema_file_path.to_str() {
        Some(s) => s,
        None => my_compile_error!("Schema file path is not valid UTF-8."),
    };
    quote! {
        const _HACK_TO_FORCE_RECOMPILE_UPON_CHANGING_SCHEMA_FILE: &'static str = include_str!(#path_str);
        #code
    }
    .into()
}

fn resolve_schema_path(raw: &str) -> Option<PathBuf> {
    let from_working_dir = env::current_dir().ok()?.join(raw);
    if from_working_dir.exists() {
        return Some(from_working_dir);
    }
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").ok()?;
    let from_manifest_dir = PathBuf::from(manifest_dir).join(raw);
    from_manifest_dir.exists().then_some(from_manifest_dir)
}
