/*
Grammar for the schema file format:

// x* means x zero or more times
// x? means x zero or one time

schema := role*
role := "role" identifier "{" item* "}"
item := module | method
module := "mod" identifier "{" item* "}"
method := ("fn" | "callback") identifier "(" parameterList? ")" returnType? ";"
parameterList := parameter ("," parameter)*
parameter := identifier ":" type
returnType := "->" type
type := ("string" | "int" | "float" | "bool" | "object") "[]"*
identifier := [a-zA-Z][a-zA-Z0-9_]*   // excluding schema keywords, type names,
                                      // and Rust keywords

Whitespace is allowed between any two tokens. Role names must be unique
across the file, and sibling names within a role or module body must be
unique across modules and methods together; the parser rejects collisions.
Collisions between full dispatch paths of methods in different modules are
caught later, in path resolution.
*/

use std::collections::HashSet;
use std::iter::once;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{multispace0, multispace1, satisfy};
use nom::combinator::{eof, map, map_res, opt, value, verify};
use nom::error::ParseError;
use nom::multi::{many0, separated_list0};
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::{IResult, Parser};

use crate::schema::{
    BindingMode, Identifier, InterfaceNode, MethodSignature, RoleDef, Schema, ValueType,
};

const SCHEMA_KEYWORDS: &[&str] = &[
    "role", "mod", "fn", "callback", "string", "int", "float", "bool", "object",
];

// Schema names become identifiers in the generated code, so Rust's keywords
// (including the reserved-for-future ones) are off limits too.
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "for", "if", "impl", "in", "let", "loop", "match", "move", "mut", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final", "macro",
    "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Parses an entire schema file. The input must be consumed completely.
pub fn parse_schema(input: &str) -> IResult<&str, Schema> {
    terminated(
        map_res(many0_padded_by_multispace(parse_role), roles_into_schema),
        eof,
    )(input)
}

fn roles_into_schema(roles: Vec<RoleDef>) -> Result<Schema, String> {
    let mut taken = HashSet::new();
    for role in &roles {
        if !taken.insert(role.name.0.as_str()) {
            let message = format!("Duplicate role name: {:?}", role.name.0);
            // map_res discards the error value, so print it here.
            eprintln!("{message}");
            return Err(message);
        }
    }
    Ok(Schema { roles })
}

fn parse_role(input: &str) -> IResult<&str, RoleDef> {
    map_res(
        tuple((
            tag("role"),
            multispace1,
            parse_identifier,
            multispace0,
            tag("{"),
            many0_padded_by_multispace(parse_item),
            tag("}"),
        )),
        |(_, _, name, _, _, items, _)| {
            let root = items_into_node(name.clone(), items)?;
            Ok::<_, String>(RoleDef { name, root })
        },
    )(input)
}

/// A single entry in a role or module body.
enum Item {
    Module(InterfaceNode),
    Method(MethodSignature),
}

fn parse_item(input: &str) -> IResult<&str, Item> {
    alt((map(parse_module, Item::Module), map(parse_method, Item::Method)))(input)
}

fn parse_module(input: &str) -> IResult<&str, InterfaceNode> {
    map_res(
        tuple((
            tag("mod"),
            multispace1,
            parse_identifier,
            multispace0,
            tag("{"),
            many0_padded_by_multispace(parse_item),
            tag("}"),
        )),
        |(_, _, name, _, _, items, _)| items_into_node(name, items),
    )(input)
}

fn items_into_node(name: Identifier, items: Vec<Item>) -> Result<InterfaceNode, String> {
    let mut node = InterfaceNode {
        name,
        modules: Vec::new(),
        methods: Vec::new(),
    };
    let mut taken = HashSet::new();
    for item in items {
        let item_name = match &item {
            Item::Module(module) => module.name.0.clone(),
            Item::Method(method) => method.name.0.clone(),
        };
        if !taken.insert(item_name.clone()) {
            let message = format!("Duplicate name {:?} in module {:?}", item_name, node.name.0);
            // map_res discards the error value, so print it here.
            eprintln!("{message}");
            return Err(message);
        }
        match item {
            Item::Module(module) => node.modules.push(module),
            Item::Method(method) => node.methods.push(method),
        }
    }
    Ok(node)
}

fn parse_method(input: &str) -> IResult<&str, MethodSignature> {
    map(
        tuple((
            alt((
                value(BindingMode::Handler, tag("fn")),
                value(BindingMode::Callback, tag("callback")),
            )),
            multispace1,
            parse_identifier,
            multispace0,
            tag("("),
            multispace0,
            separated_list0(tuple((multispace0, tag(","), multispace0)), parse_parameter),
            multispace0,
            tag(")"),
            opt(tuple((multispace0, tag("->"), multispace0, parse_value_type))),
            multispace0,
            tag(";"),
        )),
        |(mode, _, name, _, _, _, params, _, _, return_type, _, _)| MethodSignature {
            name,
            mode,
            params,
            return_type: return_type.map(|(_, _, _, value_type)| value_type),
        },
    )(input)
}

fn parse_parameter(input: &str) -> IResult<&str, (Identifier, ValueType)> {
    map(
        tuple((
            parse_identifier,
            multispace0,
            tag(":"),
            multispace0,
            parse_value_type,
        )),
        |(name, _, _, _, value_type)| (name, value_type),
    )(input)
}

fn parse_value_type(input: &str) -> IResult<&str, ValueType> {
    let (input, base) = alt((
        value(ValueType::String, tag("string")),
        value(ValueType::Int, tag("int")),
        value(ValueType::Float, tag("float")),
        value(ValueType::Bool, tag("bool")),
        value(ValueType::Object, tag("object")),
    ))(input)?;
    // Each "[]" suffix wraps the type in another level of sequence.
    let (input, suffixes) = many0(tag("[]"))(input)?;
    let value_type = suffixes
        .iter()
        .fold(base, |inner, _| ValueType::List(Box::new(inner)));
    Ok((input, value_type))
}

fn parse_identifier(input: &str) -> IResult<&str, Identifier> {
    let parse_almost_identifier = pair(
        satisfy(|ch| ch.is_ascii_alphabetic()),
        many0(satisfy(|ch| ch.is_ascii_alphanumeric() || ch == '_')),
    )
    .map(|(first, rest)| once(first).chain(rest).collect::<String>());

    map(
        verify(parse_almost_identifier, |name: &String| {
            !SCHEMA_KEYWORDS.contains(&name.as_str()) && !RUST_KEYWORDS.contains(&name.as_str())
        }),
        Identifier,
    )(input)
}

/// Like `many0`, but allows whitespace before, between, and after the items.
fn many0_padded_by_multispace<'a, O, E, F>(
    parser: F,
) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>, E>
where
    F: Parser<&'a str, O, E>,
    E: ParseError<&'a str>,
{
    preceded(multispace0, many0(terminated(parser, multispace0)))
}
