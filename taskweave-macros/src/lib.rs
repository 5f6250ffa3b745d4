mod attr;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs the body of `main` inside a freshly built runner.
///
/// The runner is installed for the main thread while the body runs, then
/// drained and disposed before `main` returns. The flavor defaults to
/// `current_thread`:
///
/// ```rust,ignore
/// #[taskweave::main(flavor = "parallel")]
/// fn main() {
///     let task = taskweave::schedule(|| Ok(21)).then(|x| Ok(x * 2));
///     assert_eq!(task.wait_value().unwrap(), 42);
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let flavor = match attr::parse_flavor(attr, "current_thread") {
        Ok(flavor) => flavor,
        Err(message) => return attr::compile_error(&message),
    };

    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some(pos) = body_position(&tokens) else {
        return attr::compile_error("expected a function body");
    };

    tokens[pos] = wrap_body(&tokens[pos], return_type(&tokens[..pos]), &flavor);
    tokens.into_iter().collect()
}

/// Like [`macro@main`], for a `#[test]` function.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let flavor = match attr::parse_flavor(attr, "current_thread") {
        Ok(flavor) => flavor,
        Err(message) => return attr::compile_error(&message),
    };

    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some(pos) = body_position(&tokens) else {
        return attr::compile_error("expected a function body");
    };

    tokens[pos] = wrap_body(&tokens[pos], return_type(&tokens[..pos]), &flavor);

    let mut result: Vec<TokenTree> = "#[test]"
        .parse::<TokenStream>()
        .map(|attr| attr.into_iter().collect())
        .unwrap_or_default();

    result.extend(tokens);
    result.into_iter().collect()
}

/// Index of the function body: the last brace-delimited group.
fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// The declared return type of the signature, if any.
///
/// Everything after the `->` arrow, up to the `where` clause or the body.
fn return_type(signature: &[TokenTree]) -> Option<String> {
    let arrow = signature.windows(2).rposition(|pair| {
        matches!(
            pair,
            [TokenTree::Punct(a), TokenTree::Punct(b)] if a.as_char() == '-' && b.as_char() == '>'
        )
    })?;

    let ty: TokenStream = signature[arrow + 2..]
        .iter()
        .take_while(|t| !matches!(t, TokenTree::Ident(id) if id.to_string() == "where"))
        .cloned()
        .collect();

    Some(ty.to_string())
}

fn wrap_body(body: &TokenTree, output: Option<String>, flavor: &str) -> TokenTree {
    let TokenTree::Group(group) = body else {
        return body.clone();
    };

    let output = output.map(|ty| format!("-> {ty}")).unwrap_or_default();

    let block = format!(
        "{{
            let __runner = ::taskweave::RunnerBuilder::new().flavor({flavor}).build();
            let __out = ::taskweave::with_async_scheduler(&__runner, || {output} {{ {} }});
            __runner.run_until_idle();
            __runner.dispose();
            __out
        }}",
        group.stream()
    );

    match block.parse() {
        Ok(stream) => TokenTree::Group(Group::new(Delimiter::Brace, stream)),
        Err(_) => body.clone(),
    }
}
