//! Keyword-scripted fallback replies
//!
//! Used whenever the generative backend is unconfigured or unreachable.

const PAYMENT: &str = "TrustHire supports secure payments via Razorpay (UPI, Cards, NetBanking) and Crypto (MetaMask). All payments are held in escrow until project completion!";
const HIRING: &str = "You can browse verified freelancers on TrustHire, view their profiles and ratings, and hire them for your projects. Post a project to get started!";
const PROJECTS: &str = "To post a project, describe your requirements, set a budget, and choose between fixed-price or hourly work. Freelancers will then apply to your project!";
const ESCROW: &str = "Our escrow system holds payment securely until project milestones are completed. This protects both clients and freelancers!";
const GREETING: &str = "Hello! How can I help you today? I can answer questions about hiring freelancers, posting projects, or our payment system.";
const DEFAULT: &str = "I'm here to help with TrustHire! You can ask me about posting projects, hiring freelancers, payments, or how our platform works.";

/// Pick a scripted reply by keyword; first match wins
pub fn fallback_response(message: &str) -> &'static str {
    let lower = message.to_lowercase();

    if lower.contains("payment") || lower.contains("pay") {
        PAYMENT
    } else if lower.contains("freelancer") || lower.contains("hire") {
        HIRING
    } else if lower.contains("project") || lower.contains("post") {
        PROJECTS
    } else if lower.contains("escrow") {
        ESCROW
    } else if lower.contains("hello") || lower.contains("hi") || lower.contains("hey") {
        GREETING
    } else {
        DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_routing() {
        assert_eq!(fallback_response("How do I pay?"), PAYMENT);
        assert_eq!(fallback_response("I want to HIRE someone"), HIRING);
        assert_eq!(fallback_response("posting a project"), PROJECTS);
        assert_eq!(fallback_response("what is escrow"), ESCROW);
        assert_eq!(fallback_response("hello there"), GREETING);
        assert_eq!(fallback_response("unrelated question"), DEFAULT);
    }

    #[test]
    fn test_payment_outranks_later_keywords() {
        // "pay" and "escrow" both present; payment branch wins
        assert_eq!(fallback_response("pay into escrow"), PAYMENT);
    }
}
