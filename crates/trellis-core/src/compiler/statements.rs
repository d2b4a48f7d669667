//! Built-in directive compilation
//!
//! Every compile function is a pure mapping from raw argument text to an
//! emitted fragment. Argument text is opaque: it is relocated into the
//! fragment verbatim and the engine's evaluator gives it meaning later.
//! None of these functions validate that paired directives balance.

/// Whether `name` is a built-in directive (built-ins shadow extensions).
pub(super) fn is_builtin(name: &str) -> bool {
    compile_builtin(name, "").is_some()
}

/// Dispatch a directive name to its compile function.
///
/// Returns `None` for unknown names so the caller can fall back to the
/// extension table or pass the source text through unchanged.
pub(super) fn compile_builtin(name: &str, expression: &str) -> Option<String> {
    let compiled = match name {
        // Conditionals
        "if" => compile_if(expression),
        "elseif" => compile_else_if(expression),
        "else" => compile_else(),
        "endif" | "endunless" | "endisset" | "endempty" => compile_end_if(),
        "unless" => compile_unless(expression),
        "isset" => compile_isset(expression),
        "empty" => compile_empty(expression),

        // Loops
        "for" => compile_for(expression),
        "endfor" => compile_end_for(),
        "foreach" => compile_foreach(expression),
        "endforeach" => compile_end_foreach(),
        "forelse" => compile_forelse(expression),
        "endforelse" => compile_end_forelse(),
        "while" => compile_while(expression),
        "endwhile" => compile_end_while(),
        "switch" => compile_switch(expression),
        "case" => compile_case(expression),
        "default" => compile_default(),
        "break" => compile_break(expression),
        "continue" => compile_continue(expression),
        "endswitch" => compile_end_switch(),

        // Template inheritance
        "extends" => compile_extends(expression),
        "section" => compile_section(expression),
        "endsection" => compile_end_section(),
        "yield" => compile_yield(expression),
        "parent" => compile_parent(),
        "show" => compile_show(),

        // Includes
        "include" => compile_include(expression),
        "includeIf" => compile_include_if(expression),
        "includeWhen" => compile_include_when(expression),
        "each" => compile_each(expression),

        // Stacks
        "push" => compile_push(expression),
        "endpush" => compile_end_push(),
        "stack" => compile_stack(expression),

        // Attribute helpers
        "json" => compile_json(expression),
        "class" => compile_class(expression),
        "style" => compile_style(expression),
        "checked" => compile_flag(expression, "checked"),
        "selected" => compile_flag(expression, "selected"),
        "disabled" => compile_flag(expression, "disabled"),
        "readonly" => compile_flag(expression, "readonly"),
        "required" => compile_flag(expression, "required"),

        // Form helpers
        "csrf" => compile_csrf(),
        "method" => compile_method(expression),

        // Auth and environment gating
        "auth" => compile_auth(expression),
        "endauth" | "endguest" | "endenv" | "endproduction" => compile_end_if(),
        "guest" => compile_guest(expression),
        "env" => compile_env(expression),
        "production" => compile_production(),

        // Debug
        "dump" => compile_dump(expression),
        "dd" => compile_dd(expression),

        // Asset pipeline
        "vite" => compile_vite(expression),

        _ => return None,
    };

    Some(compiled)
}

// Conditionals

fn compile_if(expression: &str) -> String {
    format!("<% if({expression}) %>")
}

fn compile_else_if(expression: &str) -> String {
    format!("<% elseif({expression}) %>")
}

fn compile_else() -> String {
    "<% else %>".to_string()
}

fn compile_end_if() -> String {
    "<% endif %>".to_string()
}

fn compile_unless(expression: &str) -> String {
    format!("<% if(!({expression})) %>")
}

fn compile_isset(expression: &str) -> String {
    format!("<% if(isset({expression})) %>")
}

/// `@empty(expr)` is the emptiness conditional; argument-less `@empty` is
/// the divider between a `forelse` body and its empty branch.
fn compile_empty(expression: &str) -> String {
    if expression.is_empty() {
        "<% forelseempty %>".to_string()
    } else {
        format!("<% if(empty({expression})) %>")
    }
}

// Loops

fn compile_for(expression: &str) -> String {
    format!("<% for({expression}) %>")
}

fn compile_end_for() -> String {
    "<% endfor %>".to_string()
}

fn compile_foreach(expression: &str) -> String {
    format!("<% foreach({expression}) %>")
}

fn compile_end_foreach() -> String {
    "<% endforeach %>".to_string()
}

fn compile_forelse(expression: &str) -> String {
    format!("<% forelse({expression}) %>")
}

fn compile_end_forelse() -> String {
    "<% endforelse %>".to_string()
}

fn compile_while(expression: &str) -> String {
    format!("<% while({expression}) %>")
}

fn compile_end_while() -> String {
    "<% endwhile %>".to_string()
}

fn compile_switch(expression: &str) -> String {
    format!("<% switch({expression}) %>")
}

fn compile_case(expression: &str) -> String {
    format!("<% case({expression}) %>")
}

fn compile_default() -> String {
    "<% default %>".to_string()
}

fn compile_break(expression: &str) -> String {
    if expression.is_empty() {
        "<% break %>".to_string()
    } else {
        format!("<% break({expression}) %>")
    }
}

fn compile_continue(expression: &str) -> String {
    if expression.is_empty() {
        "<% continue %>".to_string()
    } else {
        format!("<% continue({expression}) %>")
    }
}

fn compile_end_switch() -> String {
    "<% endswitch %>".to_string()
}

// Template inheritance

fn compile_extends(expression: &str) -> String {
    format!("<% extends({expression}) %>")
}

fn compile_section(expression: &str) -> String {
    format!("<% section({expression}) %>")
}

fn compile_end_section() -> String {
    "<% endsection %>".to_string()
}

fn compile_yield(expression: &str) -> String {
    format!("<% echo yield({expression}) %>")
}

fn compile_parent() -> String {
    "<% echo parent() %>".to_string()
}

fn compile_show() -> String {
    "<% echo show() %>".to_string()
}

// Includes

fn compile_include(expression: &str) -> String {
    format!("<% include({expression}) %>")
}

fn compile_include_if(expression: &str) -> String {
    format!("<% include_if({expression}) %>")
}

fn compile_include_when(expression: &str) -> String {
    format!("<% include_when({expression}) %>")
}

fn compile_each(expression: &str) -> String {
    format!("<% each({expression}) %>")
}

// Stacks

fn compile_push(expression: &str) -> String {
    format!("<% push({expression}) %>")
}

fn compile_end_push() -> String {
    "<% endpush %>".to_string()
}

fn compile_stack(expression: &str) -> String {
    format!("<% echo stack({expression}) %>")
}

// Attribute and output helpers

fn compile_json(expression: &str) -> String {
    format!("<% echo json({expression}) %>")
}

fn compile_class(expression: &str) -> String {
    format!("<% echo class_attr({expression}) %>")
}

fn compile_style(expression: &str) -> String {
    format!("<% echo style_attr({expression}) %>")
}

/// Conditional literal-token emission shared by the boolean attribute
/// directives (`checked`, `selected`, `disabled`, `readonly`, `required`).
fn compile_flag(expression: &str, token: &str) -> String {
    format!("<% if({expression}) %>{token}<% endif %>")
}

// Form helpers

fn compile_csrf() -> String {
    "<input type=\"hidden\" name=\"_token\" value=\"<% echo csrf_token() %>\">".to_string()
}

fn compile_method(expression: &str) -> String {
    format!("<input type=\"hidden\" name=\"_method\" value=\"<% echo {expression} %>\">")
}

// Auth and environment gating

fn compile_auth(expression: &str) -> String {
    format!("<% if(auth({expression})) %>")
}

fn compile_guest(expression: &str) -> String {
    format!("<% if(guest({expression})) %>")
}

fn compile_env(expression: &str) -> String {
    format!("<% if(env({expression})) %>")
}

fn compile_production() -> String {
    "<% if(production()) %>".to_string()
}

// Debug

fn compile_dump(expression: &str) -> String {
    format!("<% dump({expression}) %>")
}

fn compile_dd(expression: &str) -> String {
    format!("<% dd({expression}) %>")
}

// Asset pipeline

fn compile_vite(expression: &str) -> String {
    format!("<% echo vite({expression}) %>")
}
