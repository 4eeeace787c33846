//! Prompt templates compiled into the binary. Placeholders use the
//! `{{NAME}}` form and are filled by [`render`].

use crate::models::{Challenge, CrawledPage, Vulnerability};

pub const SOLVER_SYSTEM: &str = r#"You are an expert CTF (Capture The Flag) solver. Your goal is to analyze the given challenge and solve it completely.

When given a CTF challenge:
1. Navigate to the target URL to explore the challenge.
2. Analyze the page for clues, hints, or vulnerabilities.
3. Look for common CTF patterns: hidden directories or files, source code comments, HTTP headers with clues, form parameters to exploit, encoding challenges, SQL injection, XSS, authentication bypasses.
4. Use the browser tools to interact with the page. Follow instructions on the HTML page if provided.
5. Continue investigating until you find the flag (usually in the format flag{...} or similar).

Available browser tools:
- navigate: open a URL in the browser
- find_elements: find elements using CSS selectors, XPath, ids, names or tag names
- click_element: click buttons, links or other clickable elements
- fill_field: type into form inputs and textareas
- run_script: run JavaScript in the page
- get_page_state: title, URL, headings, links, forms and visible text of the current page
- fetch: raw HTTP request (useful for APIs, raw HTML and headers); shares cookies with the browser
- get_console_logs: JavaScript console output and errors

Other tools:
- read_local_file: read a challenge file from the local files directory
- run_content_discovery(target_url, wordlist, options): finds hidden files or directories. The target_url MUST contain FUZZ at the fuzzing position and wordlist MUST be a valid path. Uses the current session cookies.
- run_injection_scan(target_url, options): tests a specific URL with parameters for SQL injection. Uses the current session cookies. Only use it on a URL that looks suspicious.

If a tool returns an error, do not retry it immediately. Analyze the error and fix the problem first.

CRITICAL RULES:
1. Use only one tool at a time and wait for its result before deciding the next action.
2. After any action that changes the page (clicking, filling forms, running JavaScript), immediately call get_page_state to see new content, redirects, revealed elements, messages, or flags that only appear after the action.

Keep exploring until you solve the challenge. Say "CHALLENGE SOLVED" when you find the flag."#;

pub const CHALLENGE_INPUT: &str = "CTF Challenge: {{INPUT}}";

const STAGE_SYSTEM: &str = r#"You are a specialized {{ROLE}} agent for solving web CTF challenges.

Your role is to {{DUTY}}.

Key guidelines:
- Be systematic and document what you find
- Focus on security vulnerabilities and exploitation techniques
- Always consider the challenge context and flag format
- Prioritize high-confidence vulnerabilities"#;

pub const CRAWL_PLAN: &str = r#"Analyze this CTF challenge and create a crawling strategy:

Challenge URL: {{URL}}
Challenge Description: {{DESCRIPTION}}
Source Code: {{SOURCE_CODE}}
Flag Format: {{FLAG_FORMAT}}

Identify key areas to focus on, hidden endpoints worth discovering, forms and parameters to examine, the technology stack, and common CTF vulnerability patterns.

Return a JSON object with strategy, focus_areas and discovery_techniques. Known discovery techniques: directory_bruteforce, parameter_discovery, follow_links."#;

pub const CRAWL_ANALYSIS: &str = r#"Analyze this crawled web application data:

Total pages crawled: {{PAGE_COUNT}}
Challenge context: {{DESCRIPTION}}

Pages found:
{{PAGES}}

Forms discovered:
{{FORMS}}

Return a JSON object with:
- technologies: list of identified technologies
- endpoints: list of interesting endpoints"#;

pub const SOURCE_ANALYSIS: &str = r#"Analyze this source code for security vulnerabilities and exploitation opportunities:

Challenge Description: {{DESCRIPTION}}
Flag Format: {{FLAG_FORMAT}}

Source Code:
{{SOURCE_CODE}}

Cover the key vulnerabilities, the application data flow, likely attack vectors, interesting functions or endpoints, security mechanisms in place, and exploitation recommendations."#;

pub const WEB_ANALYSIS: &str = r#"Analyze this crawled web application:

Challenge Context: {{DESCRIPTION}}
Pages Crawled: {{PAGE_COUNT}}
Forms Found: {{FORM_COUNT}}

Content Summary:
{{CONTENT}}

Cover application functionality and user flows, security-relevant features, attack surfaces, interesting parameters and endpoints, the technology stack, and observed weaknesses."#;

pub const EXTRACT_FACTS: &str = r#"From this analysis, extract:

{{ANALYSIS}}

Return a JSON object with:
- technologies: array of identified technologies/frameworks
- endpoints: array of interesting URLs/endpoints found"#;

pub const THREAT_MODEL: &str = r#"Perform STRIDE threat modeling for this CTF web application:

Challenge: {{ID}}
Description: {{DESCRIPTION}}
URL: {{URL}}
Flag Format: {{FLAG_FORMAT}}

Application Analysis:
{{ANALYSIS}}

Technology Stack: {{TECHNOLOGIES}}
Crawled Pages: {{PAGE_COUNT}}
Forms Found:
{{FORMS}}

Consider Spoofing, Tampering, Repudiation, Information Disclosure, Denial of Service and Elevation of Privilege. Focus on vulnerabilities common in CTF challenges: SQL injection, XSS, CSRF, authentication bypass, authorization flaws, file upload, command injection, XXE, SSRF.

Cover assets, threats, the attack surface, a vulnerability assessment, risk priorities, and concrete attack scenarios."#;

pub const IDENTIFY_VULNERABILITIES: &str = r#"Identify specific vulnerabilities from this analysis:

Threat Model:
{{THREAT_MODEL}}

Application Details:
- Pages: {{PAGES}}
- Forms: {{FORMS}}
- Technology: {{TECHNOLOGIES}}

Return a JSON array of vulnerability objects with:
- vulnerability_type: string
- location: string (URL/endpoint where the vulnerability exists)
- description: string
- confidence: float (0.0 to 1.0)
- attack_vectors: array of strings
- payload_suggestions: array of strings

Only include vulnerabilities that are exploitable in this application."#;

pub const EXPLOITATION_PLAN: &str = r#"Generate an exploitation plan for this CTF challenge:

Challenge: {{ID}}
Flag Format: {{FLAG_FORMAT}}

Identified Vulnerabilities:
{{VULNERABILITIES}}

Return a JSON object with:
- priority_order: array of vulnerability types in priority order
- attack_vectors: attack vector definitions
- payloads: payloads keyed by vulnerability type
- testing_sequence: step-by-step testing approach
- success_indicators: how to recognise successful exploitation
- flag_extraction: likely flag locations and extraction methods"#;

/// Replace every `{{KEY}}` with its value. Unknown placeholders stay as is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

/// System prompt shared by the workflow stages.
pub fn stage_system(role: &str, duty: &str) -> String {
    render(STAGE_SYSTEM, &[("ROLE", role), ("DUTY", duty)])
}

pub fn challenge_input(challenge: &Challenge) -> String {
    render(CHALLENGE_INPUT, &[("INPUT", &challenge.prompt_input())])
}

/// `METHOD action (fields: a, b)` per form, one per line.
pub fn forms_summary(pages: &[CrawledPage], with_types: bool) -> String {
    let lines: Vec<String> = pages
        .iter()
        .flat_map(|p| p.forms.iter())
        .map(|form| {
            let fields: Vec<String> = form
                .named_fields()
                .map(|f| if with_types { format!("{} ({})", f.name, f.field_type) } else { f.name.clone() })
                .collect();
            if fields.is_empty() {
                format!("{} {}", form.method, form.action)
            } else {
                format!("{} {} (fields: {})", form.method, form.action, fields.join(", "))
            }
        })
        .collect();
    if lines.is_empty() {
        "No forms found".to_string()
    } else {
        lines.join("\n")
    }
}

/// `url (Status: n, Title: t) - Inputs: a, b` for the first `limit` pages.
pub fn pages_summary(pages: &[CrawledPage], limit: usize) -> String {
    let lines: Vec<String> = pages
        .iter()
        .take(limit)
        .map(|page| {
            let mut line = format!("{} (Status: {}, Title: {})", page.url, page.status_code, page.title);
            let inputs: Vec<&str> = page
                .inputs
                .iter()
                .filter(|i| !i.name.is_empty())
                .map(|i| i.name.as_str())
                .collect();
            if !inputs.is_empty() {
                line.push_str(&format!(" - Inputs: {}", inputs.join(", ")));
            }
            line
        })
        .collect();
    if lines.is_empty() {
        "No pages crawled".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn vulnerabilities_summary(vulns: &[Vulnerability]) -> String {
    vulns
        .iter()
        .map(|v| {
            format!(
                "- {} at {} (confidence: {})\n  Vectors: {}",
                v.vulnerability_type,
                v.location,
                v.confidence,
                v.attack_vectors.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn or_unknown(items: &[String]) -> String {
    if items.is_empty() {
        "Unknown".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Form, FormField};

    #[test]
    fn test_render_replaces_placeholders() {
        let out = render("a {{X}} b {{Y}} {{Z}}", &[("X", "1"), ("Y", "2")]);
        assert_eq!(out, "a 1 b 2 {{Z}}");
    }

    #[test]
    fn test_challenge_input_prefix() {
        let c = Challenge::new("http://t/", "find it");
        assert!(challenge_input(&c).starts_with("CTF Challenge: "));
        assert!(challenge_input(&c).contains("http://t/"));
    }

    #[test]
    fn test_forms_summary() {
        let mut page = CrawledPage::new("http://t/login", 200);
        page.forms.push(Form {
            action: "http://t/login".into(),
            method: "POST".into(),
            fields: vec![FormField {
                name: "username".into(),
                field_type: "text".into(),
                value: String::new(),
                required: true,
            }],
        });
        assert_eq!(forms_summary(&[page.clone()], false), "POST http://t/login (fields: username)");
        assert_eq!(forms_summary(&[page], true), "POST http://t/login (fields: username (text))");
        assert_eq!(forms_summary(&[], false), "No forms found");
    }
}
