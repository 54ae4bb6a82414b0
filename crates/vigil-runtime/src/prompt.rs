//! System prompt assembly.
//!
//! The prompt is rebuilt every turn so accumulating state — newly recorded
//! findings, newly marked areas — is always reflected. Sections are
//! concatenated in a fixed order; empty sections are omitted.

use std::fmt::Write;

/// Paths in and out of scope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Paths/packages to investigate.
    pub in_scope: Vec<String>,
    /// Paths/packages to skip.
    pub out_scope: Vec<String>,
}

/// Optional bug bounty metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BountyProgram {
    /// Platform ("hackerone", "bugcrowd", "immunefi").
    pub platform: String,
    /// Program name.
    pub name: String,
    /// Program rules text.
    pub rules: String,
    /// Reward range text.
    pub reward_range: String,
}

/// Everything needed to build one agent's system prompt.
#[derive(Clone, Debug, Default)]
pub struct PromptConfig {
    /// `"single"`, `"agent_a"`, or `"agent_b"`.
    pub mode: String,
    /// Project display name.
    pub project_name: String,
    /// Sandbox root path.
    pub root_path: String,
    /// What to look for (e.g. "authentication bypass").
    pub focus: String,
    /// Scope lists.
    pub scope: ScopeConfig,
    /// Bounty program, when analyzing for one.
    pub bounty_program: Option<BountyProgram>,
    /// Titles of findings already recorded (deduplication).
    pub previous_findings: Vec<String>,
    /// `"path: pattern"` strings already covered.
    pub investigated_areas: Vec<String>,
    /// Partner's model ID, collaborative mode only.
    pub partner_model: Option<String>,
}

/// Build the full system prompt for an agent.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn build_system_prompt(cfg: &PromptConfig) -> String {
    let mut b = String::with_capacity(2048);

    // 1. Role
    b.push_str(
        "You are a senior security researcher conducting a thorough vulnerability assessment.\n\
         Your goal is to find real, exploitable security vulnerabilities — not theoretical issues.\n\
         You have access to the project's source code through a set of tools.\n\n",
    );

    // 2. Project identity
    let _ = writeln!(b, "## Project: {}", cfg.project_name);
    let _ = writeln!(b, "Root path: {}\n", cfg.root_path);

    // 3. Focus
    if !cfg.focus.is_empty() {
        let _ = writeln!(b, "## Investigation Focus\n{}\n", cfg.focus);
    }

    // 4. Scope
    if !cfg.scope.in_scope.is_empty() || !cfg.scope.out_scope.is_empty() {
        b.push_str("## Scope\n");
        if !cfg.scope.in_scope.is_empty() {
            b.push_str("IN SCOPE (investigate these):\n");
            for path in &cfg.scope.in_scope {
                let _ = writeln!(b, "  - {path}");
            }
        }
        if !cfg.scope.out_scope.is_empty() {
            b.push_str("OUT OF SCOPE (do not investigate):\n");
            for path in &cfg.scope.out_scope {
                let _ = writeln!(b, "  - {path}");
            }
        }
        b.push('\n');
    }

    // 5. Bounty program
    if let Some(bp) = &cfg.bounty_program {
        let _ = writeln!(b, "## Bug Bounty Program: {} ({})", bp.name, bp.platform);
        if !bp.reward_range.is_empty() {
            let _ = writeln!(b, "Reward range: {}", bp.reward_range);
        }
        if !bp.rules.is_empty() {
            let _ = writeln!(b, "Program rules:\n{}", bp.rules);
        }
        b.push('\n');
    }

    // 6. Previous findings (deduplication)
    if !cfg.previous_findings.is_empty() {
        b.push_str("## Already Reported Findings\n");
        b.push_str("The following vulnerabilities have already been found. Do NOT report duplicates:\n");
        for title in &cfg.previous_findings {
            let _ = writeln!(b, "  - {title}");
        }
        b.push('\n');
    }

    // 7. Investigated areas
    if !cfg.investigated_areas.is_empty() {
        b.push_str("## Previously Investigated Areas\n");
        b.push_str("These areas have already been analyzed. Focus on unexplored code:\n");
        for area in &cfg.investigated_areas {
            let _ = writeln!(b, "  - {area}");
        }
        b.push('\n');
    }

    // 8. Collaborative mode
    if cfg.mode == "agent_a" || cfg.mode == "agent_b" {
        b.push_str("## Collaborative Mode\n");
        if cfg.mode == "agent_a" {
            b.push_str("You are Agent A. You have a partner (Agent B) investigating complementary areas.\n");
        } else {
            b.push_str("You are Agent B. You have a partner (Agent A) investigating complementary areas.\n");
        }
        if let Some(model) = &cfg.partner_model {
            let _ = writeln!(b, "Your partner is using model: {model}");
        }
        b.push_str(
            "\nCommunication channel:\n\
             - Use read_channel every ~8 tool calls to check for messages from your partner.\n\
             - Use post_channel to share important context or findings with your partner.\n\
             - Message types: \"finding\" (share a discovered vulnerability), \"question\" (ask your partner),\n\
             \x20 \"context\" (share useful context), \"duplicate\" (flag a duplicate finding).\n\
             - When you find something, BOTH post to channel AND call record_finding.\n\n",
        );
    }

    // 9. Methodology
    b.push_str(
        "## Investigation Methodology\n\
         1. Start with directory_tree to understand the project structure.\n\
         2. Use find_files to locate key files (configs, auth modules, input handlers, etc.).\n\
         3. Use code_search for targeted pattern searches (e.g., SQL queries, eval(), exec(), unsafe deserialization).\n\
         4. Use view_lines to read specific code sections and confirm vulnerabilities.\n\
         5. Use git_log to check recent changes that might introduce bugs.\n\
         6. After investigating an area, call mark_investigated so it's not re-covered.\n\
         \n\
         Be methodical. Map the attack surface before diving into specific files.\n",
    );

    // 10. Reporting contract
    b.push_str(
        "\n## Reporting Findings\n\
         When you confirm a vulnerability, call record_finding with:\n\
         - title: Clear, descriptive title\n\
         - location: file:line or file:function\n\
         - severity: critical | high | medium | low | info\n\
         - confidence: confirmed | likely | suspected\n\
         - description: What the vulnerability is and why it matters\n\
         - data_flow: How to trigger it (attack vector / data flow)\n\
         - category: CWE ID or custom category (e.g., \"CWE-89: SQL Injection\")\n\
         \n\
         Only report real vulnerabilities you can trace through the code. Avoid false positives.\n\
         Do not report style issues, missing best practices, or theoretical risks without evidence.\n",
    );

    b
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
