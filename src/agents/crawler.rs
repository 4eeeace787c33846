use std::collections::BTreeSet;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::http::{HttpRequest, HttpResponse};
use crate::models::{CrawledPage, Form, FormField, PageInput};
use crate::pipeline::{FrontierEntry, StageExecutor, StageName, WorkflowEvent, WorkflowState};
use super::prompts;
use super::structured::{ask_json, merge_unique, Reply, SiteFacts};

/// Links further than this from the seed are never queued.
pub const MAX_LINK_DEPTH: u32 = 3;

pub const COMMON_DIRECTORIES: [&str; 19] = [
    "/admin", "/administrator", "/login", "/dashboard", "/panel",
    "/api", "/uploads", "/files", "/backup", "/config",
    "/test", "/dev", "/staging", "/debug", "/robots.txt",
    "/sitemap.xml", "/.git", "/.env", "/backup.sql",
];

pub const COMMON_PARAMETERS: [&str; 8] = ["id", "user", "file", "path", "url", "cmd", "page", "debug"];

/// Used when the model's plan does not decode.
pub fn default_plan() -> Value {
    json!({
        "strategy": "comprehensive_crawl",
        "focus_areas": ["forms", "admin_panels", "file_uploads"],
        "discovery_techniques": ["directory_bruteforce", "parameter_discovery", "js_analysis"]
    })
}

/// Used when the plan request itself fails.
pub fn basic_plan() -> Value {
    json!({
        "strategy": "basic_crawl",
        "focus_areas": ["main_pages"],
        "discovery_techniques": ["follow_links"]
    })
}

fn plans_technique(plan: &Value, technique: &str) -> bool {
    plan.get("discovery_techniques")
        .and_then(Value::as_array)
        .is_some_and(|items| items.iter().any(|t| t.as_str() == Some(technique)))
}

/// Breadth-first crawl of the target in batches, one batch per visit.
pub struct CrawlExecutor;

#[async_trait]
impl StageExecutor for CrawlExecutor {
    fn stage(&self) -> StageName {
        StageName::Crawl
    }

    async fn execute(&self, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
        if state.crawl_plan.is_none() {
            let plan = request_plan(state, ctx).await?;
            seed_frontier(state, &plan);
            state.crawl_plan = Some(plan);
        }

        let crawler = &ctx.config().crawler;
        let max_depth = MAX_LINK_DEPTH.min(crawler.max_depth);
        let follow_scripts = state.crawl_plan.as_ref().is_some_and(|p| plans_technique(p, "js_analysis"));
        let budget = crawler.batch_size.min(crawler.max_pages.saturating_sub(state.crawled_pages.len()));
        let http = ctx.http().await?;

        let mut fetched = 0usize;
        while fetched < budget {
            let Some(entry) = state.frontier.pop_front() else { break };
            if !state.visited.insert(entry.url.clone()) {
                continue;
            }
            fetched += 1;

            debug!(url = %entry.url, depth = entry.depth, "Crawling");
            let response = match http.send(HttpRequest::get(&entry.url)).await {
                Ok(response) => response,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(url = %entry.url, error = %e, "Failed to crawl");
                    state.stage_mut(StageName::Crawl).errors.push(format!("{}: {}", entry.url, e));
                    continue;
                }
            };

            let page = parse_page(&entry.url, &response);
            if entry.depth < max_depth {
                let mut next: Vec<String> = page.links.clone();
                if follow_scripts {
                    next.extend(script_sources(&entry.url, &response.body));
                }
                for link in next {
                    enqueue(state, link, entry.depth + 1);
                }
            }
            state.crawled_pages.push(page);
        }

        let visited = state.visited.len();
        let pending = state.frontier.len();
        let progress = if pending == 0 { 1.0 } else { visited as f64 / (visited + pending) as f64 };
        let stage = state.stage_mut(StageName::Crawl);
        stage.set_progress(progress);
        stage.log(format!("Fetched {} pages, {} queued", fetched, pending));
        info!(fetched, total = state.crawled_pages.len(), queued = pending, "Crawl batch finished");
        ctx.emit(WorkflowEvent::Message {
            text: format!("Crawled {} pages ({} queued)", state.crawled_pages.len(), pending),
        })
        .await;

        let finished = pending == 0 || state.crawled_pages.len() >= crawler.max_pages;
        if finished && fetched > 0 {
            analyze_site(state, ctx).await?;
        }
        Ok(())
    }
}

async fn request_plan(state: &WorkflowState, ctx: &RunContext) -> Result<Value, FlaghuntError> {
    let challenge = &state.challenge;
    let prompt = prompts::render(
        prompts::CRAWL_PLAN,
        &[
            ("URL", &challenge.url),
            ("DESCRIPTION", &challenge.description),
            ("SOURCE_CODE", challenge.source_code.as_deref().unwrap_or("Not provided")),
            ("FLAG_FORMAT", &challenge.flag_format),
        ],
    );
    let system = prompts::stage_system(
        "crawler",
        "explore the target application, map its pages, forms and parameters, and discover hidden endpoints",
    );
    let plan = match ask_json::<Value>(ctx, &system, &prompt).await? {
        Reply::Parsed(plan) if plan.is_object() => plan,
        Reply::Parsed(_) | Reply::Unparsed(_) => default_plan(),
        Reply::Failed(_) => basic_plan(),
    };
    info!(strategy = %plan["strategy"], "Crawl plan ready");
    Ok(plan)
}

/// Seed URL first, then the discovery guesses the plan asks for.
pub fn seed_frontier(state: &mut WorkflowState, plan: &Value) {
    let target = state.challenge.url.clone();
    enqueue(state, target.clone(), 0);
    let Ok(base) = Url::parse(&target) else {
        warn!(url = %target, "Target is not an absolute URL, skipping discovery seeds");
        return;
    };
    if plans_technique(plan, "directory_bruteforce") {
        for dir in COMMON_DIRECTORIES {
            if let Ok(url) = base.join(dir) {
                enqueue(state, url.to_string(), 1);
            }
        }
    }
    if plans_technique(plan, "parameter_discovery") {
        for param in COMMON_PARAMETERS {
            enqueue(state, format!("{}?{}=test", target, param), 1);
        }
    }
}

fn enqueue(state: &mut WorkflowState, url: String, depth: u32) {
    if state.visited.contains(&url) || state.frontier.iter().any(|e| e.url == url) {
        return;
    }
    state.frontier.push_back(FrontierEntry { url, depth });
}

async fn analyze_site(state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
    let pages = prompts::pages_summary(&state.crawled_pages, 20);
    let forms = prompts::forms_summary(&state.crawled_pages, false);
    let prompt = prompts::render(
        prompts::CRAWL_ANALYSIS,
        &[
            ("PAGE_COUNT", &state.crawled_pages.len().to_string()),
            ("DESCRIPTION", &state.challenge.description),
            ("PAGES", &pages),
            ("FORMS", &forms),
        ],
    );
    let system = prompts::stage_system("crawler", "identify the technology stack and the interesting endpoints of the crawled application");
    let facts = match ask_json::<SiteFacts>(ctx, &system, &prompt).await? {
        Reply::Parsed(facts) => facts,
        Reply::Unparsed(_) => SiteFacts::default(),
        Reply::Failed(message) => {
            state.stage_mut(StageName::Crawl).errors.push(message);
            SiteFacts::default()
        }
    };
    let techs = merge_unique(&mut state.technologies, facts.technologies);
    let endpoints = merge_unique(&mut state.endpoints, facts.endpoints);
    debug!(techs, endpoints, "Site analysis merged");
    Ok(())
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn select_in<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    selector(css).map(|s| root.select(&s).collect()).unwrap_or_default()
}

fn attr(el: &ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().to_string()
}

fn field_type(el: &ElementRef<'_>) -> String {
    el.value().attr("type").unwrap_or("text").to_string()
}

fn same_site(candidate: &Url, base: &Url) -> bool {
    matches!(candidate.scheme(), "http" | "https")
        && candidate.host_str() == base.host_str()
        && candidate.port_or_known_default() == base.port_or_known_default()
}

/// Extract title, forms, same-site links, inputs and cookies from a response.
pub fn parse_page(url: &str, response: &HttpResponse) -> CrawledPage {
    let document = Html::parse_document(&response.body);
    let root = document.root_element();
    let base = Url::parse(url).ok();

    let mut page = CrawledPage::new(url, response.status);
    page.content = response.body.clone();
    page.headers = response.headers.clone();
    page.cookies = response.cookies.clone();
    page.response_time_ms = response.elapsed_ms;
    page.title = select_in(root, "title")
        .first()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    page.forms = select_in(root, "form")
        .into_iter()
        .map(|form| {
            let action = attr(&form, "action");
            let action = base
                .as_ref()
                .and_then(|b| b.join(&action).ok())
                .map(|u| u.to_string())
                .unwrap_or(action);
            let method = form.value().attr("method").unwrap_or("GET").to_uppercase();
            let fields = select_in(form, "input, textarea, select")
                .into_iter()
                .map(|el| FormField {
                    name: attr(&el, "name"),
                    field_type: field_type(&el),
                    value: attr(&el, "value"),
                    required: el.value().attr("required").is_some(),
                })
                .collect();
            Form { action, method, fields }
        })
        .collect();

    if let Some(base) = &base {
        let mut seen = BTreeSet::new();
        for anchor in select_in(root, "a[href]") {
            let Some(href) = anchor.value().attr("href") else { continue };
            let Ok(mut link) = base.join(href) else { continue };
            link.set_fragment(None);
            if same_site(&link, base) && seen.insert(link.to_string()) {
                page.links.push(link.to_string());
            }
        }
    }

    page.inputs = select_in(root, "input, textarea, select")
        .into_iter()
        .map(|el| PageInput {
            name: attr(&el, "name"),
            input_type: field_type(&el),
            id: attr(&el, "id"),
            placeholder: attr(&el, "placeholder"),
            value: attr(&el, "value"),
        })
        .collect();
    page
}

/// Same-site `<script src>` URLs of a document.
pub fn script_sources(url: &str, body: &str) -> Vec<String> {
    let Ok(base) = Url::parse(url) else { return Vec::new() };
    let document = Html::parse_document(body);
    select_in(document.root_element(), "script[src]")
        .into_iter()
        .filter_map(|s| s.value().attr("src").and_then(|src| base.join(src).ok()))
        .filter(|u| same_site(u, &base))
        .map(|u| u.to_string())
        .collect()
}
