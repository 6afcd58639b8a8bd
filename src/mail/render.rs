//! Placeholder expansion for outbound messages.
//!
//! Four fixed tokens are substituted against the per-recipient context.
//! Expansion is a single pass over the template: a replacement value is
//! emitted verbatim and never re-scanned, and unknown tokens are left
//! untouched. Subjects and bodies are expanded identically.

/// Fallback when the sender has no display name.
pub const COMPANY_FALLBACK: &str = "Your Company";

/// Per-recipient substitution context.
pub struct MessageContext<'a> {
    pub recipient: &'a str,
    pub sender_name: Option<&'a str>,
    pub date: &'a str,
}

/// Current date in short form, e.g. `8/6/2026`.
pub fn today_short() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}

/// Local part of an address: everything before the first `@`.
pub fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

pub fn expand_tokens(template: &str, ctx: &MessageContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match match_token(tail, ctx) {
            Some((value, token_len)) => {
                out.push_str(value);
                rest = &tail[token_len..];
            }
            None => {
                out.push('$');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Longest token first so `$companyName` is never shadowed by a shorter
/// prefix match.
fn match_token<'a>(tail: &str, ctx: &'a MessageContext) -> Option<(&'a str, usize)> {
    const COMPANY: &str = "$companyName";
    const USER: &str = "$userName";
    const EMAIL: &str = "$email";
    const DATE: &str = "$date";

    if tail.starts_with(COMPANY) {
        let name = ctx
            .sender_name
            .filter(|name| !name.is_empty())
            .unwrap_or(COMPANY_FALLBACK);
        Some((name, COMPANY.len()))
    } else if tail.starts_with(USER) {
        Some((local_part(ctx.recipient), USER.len()))
    } else if tail.starts_with(EMAIL) {
        Some((ctx.recipient, EMAIL.len()))
    } else if tail.starts_with(DATE) {
        Some((ctx.date, DATE.len()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx<'a>(recipient: &'a str, sender_name: Option<&'a str>, date: &'a str) -> MessageContext<'a> {
        MessageContext {
            recipient,
            sender_name,
            date,
        }
    }

    #[test]
    fn expands_user_name_and_date() {
        let rendered = expand_tokens(
            "Hello $userName, today is $date",
            &ctx("a.b@x.com", Some("Studio"), "8/6/2026"),
        );
        assert_eq!(rendered, "Hello a.b, today is 8/6/2026");
    }

    #[test]
    fn expands_recipient_address() {
        let rendered = expand_tokens("Sent to $email", &ctx("a.b@x.com", None, "1/1/2026"));
        assert_eq!(rendered, "Sent to a.b@x.com");
    }

    #[test]
    fn company_name_falls_back_when_absent_or_empty() {
        let rendered = expand_tokens("From $companyName", &ctx("a@x.com", None, "1/1/2026"));
        assert_eq!(rendered, "From Your Company");

        let rendered = expand_tokens("From $companyName", &ctx("a@x.com", Some(""), "1/1/2026"));
        assert_eq!(rendered, "From Your Company");

        let rendered = expand_tokens(
            "From $companyName",
            &ctx("a@x.com", Some("Brightlens"), "1/1/2026"),
        );
        assert_eq!(rendered, "From Brightlens");
    }

    #[test]
    fn unknown_tokens_are_left_verbatim() {
        let rendered = expand_tokens("Hi $foo and $userName", &ctx("a@x.com", None, "1/1/2026"));
        assert_eq!(rendered, "Hi $foo and a");
    }

    #[test]
    fn replacement_values_are_not_rescanned() {
        // A recipient address containing a token must come through verbatim.
        let rendered = expand_tokens("$email", &ctx("a$date@x.com", None, "1/1/2026"));
        assert_eq!(rendered, "a$date@x.com");
    }

    #[test]
    fn trailing_dollar_is_preserved() {
        let rendered = expand_tokens("price: 5$", &ctx("a@x.com", None, "1/1/2026"));
        assert_eq!(rendered, "price: 5$");
    }

    #[test]
    fn local_part_without_at_sign_is_the_whole_string() {
        assert_eq!(local_part("not-an-address"), "not-an-address");
        assert_eq!(local_part("a.b@x.com"), "a.b");
    }
}
