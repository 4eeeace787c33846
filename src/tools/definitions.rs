use std::sync::LazyLock;

use serde_json::json;

use crate::llm::ToolDefinition;

pub const NAVIGATE: &str = "navigate";
pub const FIND_ELEMENTS: &str = "find_elements";
pub const CLICK_ELEMENT: &str = "click_element";
pub const FILL_FIELD: &str = "fill_field";
pub const RUN_SCRIPT: &str = "run_script";
pub const GET_PAGE_STATE: &str = "get_page_state";
pub const FETCH: &str = "fetch";
pub const GET_CONSOLE_LOGS: &str = "get_console_logs";
pub const READ_LOCAL_FILE: &str = "read_local_file";
pub const RUN_CONTENT_DISCOVERY: &str = "run_content_discovery";
pub const RUN_INJECTION_SCAN: &str = "run_injection_scan";

fn tool(name: &str, description: &str, parameters: serde_json::Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn selector_kind() -> serde_json::Value {
    json!({"type": "string", "enum": ["css", "xpath"], "description": "Selector type, 'css' (default) or 'xpath'"})
}

static DEFINITIONS: LazyLock<Vec<ToolDefinition>> = LazyLock::new(|| {
    vec![
        tool(
            NAVIGATE,
            "Navigate the browser to a URL and return the URL, title, cookies and page source.",
            json!({
                "type": "object",
                "properties": {"url": {"type": "string", "description": "The URL to navigate to"}},
                "required": ["url"]
            }),
        ),
        tool(
            FIND_ELEMENTS,
            "Find elements on the current page by CSS selector or XPath. Returns up to 10 matches with tag, text and attributes.",
            json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "CSS selector or XPath expression"},
                    "selector_type": selector_kind()
                },
                "required": ["selector"]
            }),
        ),
        tool(
            CLICK_ELEMENT,
            "Click the first element matching a selector and return the resulting URL.",
            json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "CSS selector or XPath of the element to click"},
                    "selector_type": selector_kind()
                },
                "required": ["selector"]
            }),
        ),
        tool(
            FILL_FIELD,
            "Fill a form field (input, textarea) with a value.",
            json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "CSS selector or XPath of the field"},
                    "value": {"type": "string", "description": "Value to enter"},
                    "selector_type": selector_kind()
                },
                "required": ["selector", "value"]
            }),
        ),
        tool(
            RUN_SCRIPT,
            "Execute JavaScript in the current page and return the result.",
            json!({
                "type": "object",
                "properties": {"code": {"type": "string", "description": "JavaScript code to execute"}},
                "required": ["code"]
            }),
        ),
        tool(
            GET_PAGE_STATE,
            "Get the current page URL, title, cookies and full HTML source.",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            FETCH,
            "Send a raw HTTP request reusing the browser session cookies. Returns status, headers, cookies and the first 10000 characters of the body.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "The URL to fetch"},
                    "method": {"type": "string", "description": "HTTP method, default GET"},
                    "headers": {"type": "object", "additionalProperties": {"type": "string"}, "description": "Extra request headers"},
                    "body": {"type": "string", "description": "Raw request body"}
                },
                "required": ["url"]
            }),
        ),
        tool(
            GET_CONSOLE_LOGS,
            "Get JavaScript console messages and errors captured in the browser.",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            READ_LOCAL_FILE,
            "Read a file supplied with the challenge. Only files under the challenge files directory can be read.",
            json!({
                "type": "object",
                "properties": {"path": {"type": "string", "description": "Path of the file, e.g. files/app.py"}},
                "required": ["path"]
            }),
        ),
        tool(
            RUN_CONTENT_DISCOVERY,
            "Run ffuf content discovery. Put FUZZ in the URL where wordlist entries go. Session cookies are sent automatically.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Target URL containing the FUZZ marker"},
                    "wordlist": {"type": "string", "description": "Wordlist path inside the tool container"},
                    "options": {"type": "string", "description": "Extra ffuf command-line options"}
                },
                "required": ["url", "wordlist"]
            }),
        ),
        tool(
            RUN_INJECTION_SCAN,
            "Run sqlmap against a URL. Session cookies are sent automatically.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Target URL, including the parameters to test"},
                    "options": {"type": "string", "description": "sqlmap options, default '--batch --level=1 --risk=1'"}
                },
                "required": ["url"]
            }),
        ),
    ]
});

/// Every tool offered to the model.
pub fn all() -> Vec<ToolDefinition> {
    DEFINITIONS.clone()
}
