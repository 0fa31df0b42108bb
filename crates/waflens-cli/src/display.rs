//! Vertical card display for scanned policies.
//!
//! Each policy renders as a header plus sections for settings, custom rules
//! and managed rule overrides, with notes shown next to the node they belong to.

use std::fmt::Write;

use waflens_core::{CustomRule, ManagedRuleSet, WafPolicy};
use waflens_scan::{IssueKind, ScanReport};

const MAX_LINKS: usize = 10;

// ── Public API ──

/// Print every policy card followed by issues and a one-line summary.
pub fn print_report(report: &ScanReport) {
    for policy in &report.policies {
        print!("{}", render_policy_card(policy));
    }
    print!("{}", render_issues(report));
}

pub fn render_policy_card(policy: &WafPolicy) -> String {
    let mut out = String::new();
    let _ = write_card(&mut out, policy);
    out
}

pub fn render_issues(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = write_issues(&mut out, report);
    out
}

// ── Card sections ──

fn write_card(out: &mut String, policy: &WafPolicy) -> std::fmt::Result {
    writeln!(out, "=== {} ===", policy.name)?;
    writeln!(
        out,
        "{} in {} / {}",
        policy.kind.display_name(),
        policy.subscription_name,
        policy.resource_group_name
    )?;
    if let Some(note) = &policy.note {
        writeln!(out, "note: {note}")?;
    }
    writeln!(out)?;

    writeln!(out, "Settings")?;
    let settings = &policy.settings;
    if let Some(state) = &settings.enabled_state {
        writeln!(out, "  {:<26} {}", "state", state)?;
    }
    if let Some(mode) = &settings.mode {
        writeln!(out, "  {:<26} {}", "mode", mode)?;
    }
    if let Some(sku) = &settings.sku {
        writeln!(out, "  {:<26} {}", "sku", sku)?;
    }
    if !policy.linked_resources.is_empty() {
        writeln!(out, "  linked resources ({}):", policy.linked_resources.len())?;
        for link in policy.linked_resources.iter().take(MAX_LINKS) {
            writeln!(out, "    {link}")?;
        }
        if policy.linked_resources.len() > MAX_LINKS {
            writeln!(out, "    ... and {} more", policy.linked_resources.len() - MAX_LINKS)?;
        }
    }
    writeln!(out)?;

    if !policy.custom_rules.is_empty() {
        writeln!(out, "Custom Rules ({})", policy.custom_rules.len())?;
        for rule in &policy.custom_rules {
            write_custom_rule(out, rule)?;
        }
        writeln!(out)?;
    }

    if !policy.managed_rule_sets.is_empty() {
        writeln!(out, "Managed Rules")?;
        for set in &policy.managed_rule_sets {
            write_rule_set(out, set)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_custom_rule(out: &mut String, rule: &CustomRule) -> std::fmt::Result {
    let mut summary = format!(
        "priority {}, {}, {}, {}",
        rule.priority, rule.action, rule.rule_type, rule.enabled_state
    );
    if let (Some(threshold), Some(minutes)) =
        (rule.rate_limit_threshold, rule.rate_limit_duration_minutes)
    {
        let _ = write!(summary, ", {threshold}/{minutes}m");
    }
    writeln!(out, "  {:<26} {}", rule.name, summary)?;
    if let Some(note) = &rule.note {
        writeln!(out, "    {:<24} {}", "note", note)?;
    }
    for (index, condition) in rule.match_conditions.iter().enumerate() {
        let selector = condition
            .selector
            .as_deref()
            .map(|s| format!("[{s}]"))
            .unwrap_or_default();
        let negate = if condition.negate_condition { "not " } else { "" };
        writeln!(
            out,
            "    [{index}] {}{selector} {negate}{}",
            condition.match_variable, condition.operator
        )?;
        for value in &condition.match_values {
            match &value.note {
                Some(note) => writeln!(out, "        {:<22} note: {}", value.value, note)?,
                None => writeln!(out, "        {}", value.value)?,
            }
        }
    }
    Ok(())
}

fn write_rule_set(out: &mut String, set: &ManagedRuleSet) -> std::fmt::Result {
    let action = set
        .rule_set_action
        .as_ref()
        .map(|a| format!(" ({a})"))
        .unwrap_or_default();
    writeln!(out, "  {} {}{action}", set.rule_set_type, set.rule_set_version)?;
    for group in &set.rule_group_overrides {
        writeln!(
            out,
            "    {:<24} {} overrides, {} disabled",
            group.rule_group_name,
            group.rules.len(),
            group.disabled_rules.len()
        )?;
        for rule in &group.rules {
            let mut line = rule.state.to_string();
            if let Some(action) = &rule.action {
                let _ = write!(line, ", {action}");
            }
            match rule.exclusion_count() {
                0 => {}
                1 => line.push_str(", 1 exclusion"),
                n => {
                    let _ = write!(line, ", {n} exclusions");
                }
            }
            writeln!(out, "      {:<22} {}", rule.rule_id, line)?;
            if let Some(note) = &rule.note {
                writeln!(out, "        note: {note}")?;
            }
        }
    }
    Ok(())
}

// ── Issues ──

fn write_issues(out: &mut String, report: &ScanReport) -> std::fmt::Result {
    if !report.issues.is_empty() {
        writeln!(out, "Issues ({})", report.issues.len())?;
        for issue in &report.issues {
            let kind = match issue.kind {
                IssueKind::Enumeration => "enumeration",
                IssueKind::Fetch => "fetch",
                IssueKind::Mapping => "mapping",
                IssueKind::NotFound => "not found",
                IssueKind::Client => "client",
                IssueKind::Input => "input",
            };
            writeln!(out, "  {:<12} {:<30} {}", kind, issue.scope, issue.message)?;
        }
        writeln!(out)?;
    }
    let notes: usize = report.policies.iter().map(WafPolicy::note_count).sum();
    writeln!(
        out,
        "scan {}: {} policies, {} notes, {} issues",
        report.status,
        report.policies.len(),
        notes,
        report.issues.len()
    )
}
