use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use platdex::analytics::{self, AnalyticsReporter};
use platdex::api::ApiClient;
use platdex::browse::{BrowseEvent, Browser};
use platdex::config::{self, AdminCommand, Command, Config, SubmitArgs};
use platdex::debug;
use platdex::error::ApiError;
use platdex::query_cache::{CacheKey, PlatformOrchestrator, QueryCache, Resolved};
use platdex::render;
use platdex::review::{ActionOutcome, AdminView, MetricsDesk, ReviewDesk};
use platdex::submit::{self, SubmissionForm, SubmitOutcome};
use platdex::types::{EntityType, Metadata, Platform};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    debug::init_from_env_once();

    let (cfg, command) = config::load().context("Failed to load configuration")?;
    if debug::mask() != 0 {
        cfg.print_summary();
    }

    let client = Arc::new(ApiClient::from_config(&cfg).context("Failed to build HTTP client")?);
    let reporter = AnalyticsReporter::new(client.clone(), cfg.view_delay());

    match command {
        Command::Browse {
            search,
            categories,
            tags,
            page,
            interactive,
        } => browse(&cfg, client, search, categories, tags, page, interactive).await?,
        Command::Platform { slug } => {
            let platform = client.platform_detail(&slug).await.map_err(describe)?;
            print!("{}", render::platform_detail(&platform));
        }
        Command::Visit { entity, id, metadata } => {
            let metadata: Metadata = metadata.into_iter().collect();
            reporter.log_click(entity, id, (!metadata.is_empty()).then_some(metadata));
        }
        Command::Collections { featured, limit } => {
            let items = client
                .list_collections(featured.then_some(true), limit)
                .await
                .map_err(describe)?;
            print!("{}", render::collection_list(&items));
        }
        Command::Collection { slug, open } => {
            let collection = client.collection_detail(&slug).await.map_err(describe)?;
            print!("{}", render::collection_detail(&collection));
            let mut scope = reporter.mount();
            let mut meta = Metadata::new();
            meta.insert("slug".into(), collection.slug.clone());
            scope.log_view(EntityType::Collection, collection.id, Some(meta));
            if let Some(target) = open {
                let summary = collection
                    .platforms
                    .iter()
                    .find(|p| p.slug == target)
                    .ok_or_else(|| anyhow!("{target} is not part of collection {}", collection.slug))?;
                scope.log_click(EntityType::Platform, summary.id, Some(analytics::collection_source(&collection.slug)));
                let platform = client.platform_detail(&summary.slug).await.map_err(describe)?;
                print!("{}", render::platform_detail(&platform));
            }
            scope.settle().await;
        }
        Command::Submit(args) => submit_platform(&cfg, &client, args).await?,
        Command::Admin {
            username,
            password,
            action,
        } => admin(client, username, password, action).await?,
    }

    reporter.flush().await;
    Ok(())
}

fn describe(e: ApiError) -> anyhow::Error {
    anyhow!(e.user_message())
}

async fn browse(
    cfg: &Config,
    client: Arc<ApiClient>,
    search: Option<String>,
    categories: Vec<i64>,
    tags: Vec<i64>,
    page: Option<u32>,
    interactive: bool,
) -> Result<()> {
    let details: QueryCache<Platform> = QueryCache::new();
    let orchestrator = Arc::new(PlatformOrchestrator::new(client.clone(), QueryCache::new(), cfg.fetch_policy()));
    let (mut browser, mut rx) = Browser::new(orchestrator, cfg.page_size);

    let filters = browser.filters_mut();
    if let Some(s) = search {
        filters.set_search(&s);
    }
    for id in categories {
        filters.toggle_category(id);
    }
    for id in tags {
        filters.toggle_tag(id);
    }
    if let Some(p) = page {
        filters.set_page(p);
    }
    browser.refresh();
    browser.settle(&mut rx).await;
    print_listing(&browser);

    if !interactive {
        if let (Some(err), false) = (&browser.result().error, browser.result().has_results()) {
            bail!(err.user_message());
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let (cmd, arg) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        let arg = arg.trim();
        match cmd {
            "" => continue,
            "q" | "quit" => break,
            "s" => browser.set_search(arg),
            "c" | "t" => {
                let Ok(id) = arg.parse::<i64>() else {
                    eprintln!("expected a numeric id");
                    continue;
                };
                if cmd == "c" {
                    browser.toggle_category(id);
                } else {
                    browser.toggle_tag(id);
                }
            }
            "n" => browser.next_page(),
            "p" => browser.prev_page(),
            "g" => match arg.parse::<u32>() {
                Ok(n) => browser.set_page(n),
                Err(_) => {
                    eprintln!("expected a page number");
                    continue;
                }
            },
            "x" => browser.clear_all(),
            "o" if !arg.is_empty() => {
                open_platform(&details, &client, cfg, arg).await;
                continue;
            }
            _ => {
                eprintln!("commands: s <text>, c <id>, t <id>, n, p, g <page>, x, o <slug>, q");
                continue;
            }
        }
        browser.settle(&mut rx).await;
        print_listing(&browser);
    }

    // Late revalidations are irrelevant once the user leaves.
    while let Ok(BrowseEvent::Loaded { key, .. }) = rx.try_recv() {
        log::debug!("[browse] dropping late result for {key}");
    }
    Ok(())
}

async fn open_platform(details: &QueryCache<Platform>, client: &Arc<ApiClient>, cfg: &Config, slug: &str) {
    let key = CacheKey::detail("platform", slug);
    let client = Arc::clone(client);
    let slug = slug.to_string();
    let fetch = move || {
        let client = Arc::clone(&client);
        let slug = slug.clone();
        async move { client.platform_detail(&slug).await }
    };
    match details.resolve(&key, cfg.fetch_policy(), fetch).await {
        Resolved::Hit { value, .. } | Resolved::Fetched(Ok(value)) => print!("{}", render::platform_detail(&value)),
        Resolved::Fetched(Err(e)) => eprintln!("{}", e.user_message()),
    }
}

fn print_listing<S: platdex::PlatformSource>(browser: &Browser<S>) {
    let options = browser.filter_options();
    print!("{}", render::filter_summary(&options, browser.state()));
    let pager = browser.pager();
    print!("{}", render::platform_list(browser.result(), pager.as_ref()));
}

async fn submit_platform(cfg: &Config, client: &ApiClient, args: SubmitArgs) -> Result<()> {
    let mut form = SubmissionForm {
        submitter_name: args.name,
        submitter_email: args.email,
        platform_name: args.platform,
        description: args.description.unwrap_or_default(),
        website_url: args.website.unwrap_or_default(),
        ios_url: args.ios.unwrap_or_default(),
        android_url: args.android.unwrap_or_default(),
        web_url: args.web.unwrap_or_default(),
        screenshot_url: String::new(),
        honeypot: args.honeypot,
        recaptcha_token: cfg.recaptcha_token.clone(),
    };

    if let Some(path) = &args.screenshot {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read screenshot {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("screenshot path has no file name"))?
            .to_string();
        let url = submit::upload_screenshot(client, &mut form, &filename, args.content_type.as_deref(), bytes)
            .await
            .map_err(describe)?;
        eprintln!("Uploaded screenshot: {url}");
    }

    match submit::submit(client, &form).await? {
        SubmitOutcome::Submitted(s) => {
            println!("Submitted #{}: {} ({})", s.id, s.platform_name, render::status_label(s.status));
        }
        SubmitOutcome::Dropped => log::debug!("[submit] dropped"),
    }
    Ok(())
}

fn credentials(username: &Option<String>, password: &Option<String>) -> Result<(String, String)> {
    match (username, password) {
        (Some(u), Some(p)) => Ok((u.clone(), p.clone())),
        _ => bail!("Admin login required: pass --username/--password or set ADMIN_USERNAME/ADMIN_PASSWORD"),
    }
}

fn ready<T>(view: &AdminView<T>) -> Result<&T> {
    match view {
        AdminView::Ready(v) => Ok(v),
        AdminView::Login { error: Some(e) } => bail!("Login failed: {e}"),
        AdminView::Login { error: None } => bail!("Admin login required"),
        AdminView::Failed(msg) => bail!("{msg}"),
        AdminView::Loading => bail!("still loading"),
    }
}

async fn prompt(question: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?)
}

async fn admin(
    client: Arc<ApiClient>,
    username: Option<String>,
    password: Option<String>,
    action: AdminCommand,
) -> Result<()> {
    if let AdminCommand::Dashboard { days, top_limit } = action {
        let mut desk = MetricsDesk::with_window(client, days, top_limit);
        if desk.load().await.needs_login() {
            let (u, p) = credentials(&username, &password)?;
            desk.login(&u, &p).await;
        }
        print!("{}", render::dashboard(ready(desk.view())?));
        return Ok(());
    }

    let mut desk = ReviewDesk::new(client);
    if desk.load().await.needs_login() {
        let (u, p) = credentials(&username, &password)?;
        desk.login(&u, &p).await;
    }
    ready(desk.view())?;

    let id = match &action {
        AdminCommand::Approve { id } | AdminCommand::Reject { id, .. } => *id,
        _ => {
            print!("{}", render::submission_table(ready(desk.view())?));
            return Ok(());
        }
    };

    let target = desk
        .find(id)
        .cloned()
        .ok_or_else(|| anyhow!("Submission #{id} not found"))?;
    if target.status.available_actions().is_empty() {
        bail!("Submission #{id} is already {}", render::status_label(target.status));
    }

    let outcome = match action {
        AdminCommand::Reject { reason, .. } => {
            let reason = match reason {
                Some(r) => Some(r),
                None => prompt("Rejection reason: ").await?,
            };
            desk.reject(&target, reason.as_deref()).await
        }
        _ => desk.approve(&target).await,
    };

    match outcome {
        ActionOutcome::Done(msg) => println!("{msg}"),
        ActionOutcome::Aborted => eprintln!("Rejection cancelled; submission #{id} left pending"),
        ActionOutcome::Failed(ApiError::Unauthorized) => bail!("Admin session expired; log in again"),
        ActionOutcome::Failed(e) => bail!(e.user_message()),
    }
    Ok(())
}
