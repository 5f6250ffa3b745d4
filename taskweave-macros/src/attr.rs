use proc_macro::TokenStream;

/// Parses the arguments of `#[taskweave::main]` and `#[taskweave::test]`.
///
/// Accepts an empty list or `flavor = "<name>"`. Returns the path of the
/// matching `taskweave::Flavor` variant, or a message for `compile_error!`.
pub(crate) fn parse_flavor(attr: TokenStream, default: &str) -> Result<String, String> {
    let attr = attr.to_string();
    let mut flavor = default.to_owned();

    for part in attr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(format!("expected `key = value`, found `{part}`"));
        };

        match key.trim() {
            "flavor" => flavor = value.trim().trim_matches('"').to_owned(),
            other => return Err(format!("unknown attribute `{other}`")),
        }
    }

    let variant = match flavor.as_str() {
        "current_thread" => "CurrentThread",
        "parallel" => "Parallel",
        "manual" => "Manual",
        other => {
            return Err(format!(
                "unknown flavor `{other}`, expected `current_thread`, `parallel` or `manual`"
            ));
        }
    };

    Ok(format!("::taskweave::Flavor::{variant}"))
}

pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
