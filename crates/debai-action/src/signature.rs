//! Email signature block.

/// Sign-off lines that count as an existing signature.
const SIGN_OFFS: &[&str] = &[
    "best regards",
    "kind regards",
    "warm regards",
    "regards",
    "sincerely",
    "thanks and regards",
    "thanks & regards",
    "cheers",
];

/// The block appended to outgoing email bodies.
pub fn signature_block(sender_name: &str) -> String {
    match sender_name.trim() {
        "" => "\n\nBest regards,".to_string(),
        name => format!("\n\nBest regards,\n{}", name),
    }
}

/// Append the signature block unless the body already ends with a
/// sign-off. Applying it twice gives the same body.
pub fn sign(body: &str, sender_name: &str) -> String {
    let body = body.trim_end();
    if is_signed(body) {
        body.to_string()
    } else {
        format!("{}{}", body, signature_block(sender_name))
    }
}

/// True when one of the last three non-empty lines is a sign-off.
pub fn is_signed(body: &str) -> bool {
    body.lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(3)
        .any(|line| {
            let line = line.trim().trim_end_matches([',', '.', '!']).to_lowercase();
            SIGN_OFFS.contains(&line.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_appends_block() {
        assert_eq!(
            sign("See you tomorrow.", "DebAI Assistant"),
            "See you tomorrow.\n\nBest regards,\nDebAI Assistant"
        );
    }

    #[test]
    fn test_sign_is_idempotent() {
        let once = sign("See you tomorrow.", "DebAI Assistant");
        assert_eq!(sign(&once, "DebAI Assistant"), once);
    }

    #[test]
    fn test_sign_without_sender_name_is_idempotent() {
        let once = sign("See you tomorrow.", "");
        assert_eq!(once, "See you tomorrow.\n\nBest regards,");
        assert_eq!(sign(&once, ""), once);
    }

    #[test]
    fn test_existing_sign_off_kept() {
        let body = "Numbers attached.\n\nKind regards,\nPriya";
        assert_eq!(sign(body, "DebAI Assistant"), body);
    }

    #[test]
    fn test_regards_mid_body_not_a_signature() {
        let body = "Regards\nthe budget, we are over by 10%.\nPlease review.\nThen reply.\nSoon.";
        assert!(!is_signed(body));
    }
}
