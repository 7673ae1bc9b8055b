use anyhow::{Result, anyhow};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static LEFTOVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Interpolate `{placeholder}` slots in a prompt template from the typed map.
/// Any placeholder left unresolved after substitution is an error; a template
/// referencing a field the caller did not supply must fail before the prompt
/// reaches the model, not after.
pub fn render_template(template: &str, values: &HashMap<&str, &str>) -> Result<String> {
    let mut rendered = template.to_string();
    for (name, value) in values {
        rendered = rendered.replace(&format!("{{{}}}", name), value);
    }

    if let Some(found) = LEFTOVER.captures(&rendered) {
        return Err(anyhow!(
            "Unresolved placeholder {{{}}} in prompt template",
            &found[1]
        ));
    }
    Ok(rendered)
}
