//! Integration tests for the crawler, indexer and search engine
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl, refresh and search cycle end-to-end.

use lemma_search::config::{parse_config, Config};
use lemma_search::crawler::{Coordinator, STOPPED_BY_USER};
use lemma_search::morphology::{DictionaryMorphology, LemmaExtractor};
use lemma_search::search::{SearchEngine, SearchError, SearchQuery};
use lemma_search::state::{IndexingFlag, SiteStatus};
use lemma_search::storage::{SqliteStorage, Storage};
use lemma_search::EngineError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DICTIONARY: &str = "\
кошка\tкошка\tNOUN
кошки\tкошка\tNOUN
кошек\tкошка\tNOUN
дом\tдом\tNOUN
дома\tдом\tNOUN
доме\tдом\tNOUN
живут\tжить\tVERB
живет\tжить\tVERB
новости\tновость\tNOUN
новость\tновость\tNOUN
";

/// Creates a test configuration with one site served by the mock server
fn create_test_config(site_url: &str) -> Config {
    parse_config(&format!(
        r#"
[indexing]
user-agent = "TestBot/1.0"
referrer = "https://referrer.example"
timeout-secs = 5

[storage]
database-path = ":memory:"

[[sites]]
url = "{}"
name = "Mock"
"#,
        site_url
    ))
    .expect("Failed to build test config")
}

fn extractor() -> LemmaExtractor {
    let morphology = DictionaryMorphology::parse(DICTIONARY).expect("Failed to parse dictionary");
    LemmaExtractor::new(Arc::new(morphology))
}

struct Harness {
    storage: Arc<SqliteStorage>,
    coordinator: Coordinator,
    config: Config,
}

fn harness(site_url: &str) -> Harness {
    let config = create_test_config(site_url);
    let storage = Arc::new(SqliteStorage::new_in_memory().expect("Failed to open storage"));
    let coordinator = Coordinator::new(config.clone(), storage.clone(), extractor())
        .expect("Failed to create coordinator");
    Harness {
        storage,
        coordinator,
        config,
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>Mock</title></head><body>{}</body></html>",
            body
        ))
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(body))
        .expect(expected_hits)
        .mount(server)
        .await;
}

/// Asserts that every lemma's frequency equals the sum of its entries
fn assert_frequency_invariant(storage: &SqliteStorage, site_id: i64, lemmas: &[&str]) {
    for lemma in lemmas {
        let Some(record) = storage.find_lemma(site_id, lemma).unwrap() else {
            continue;
        };
        let total: i64 = storage
            .find_entries_by_lemma(record.id)
            .unwrap()
            .iter()
            .map(|entry| entry.occurrences)
            .sum();
        assert_eq!(record.frequency, total, "frequency of {}", lemma);
    }
}

async fn crawl(harness: &Harness) -> lemma_search::crawler::CrawlReport {
    let flag = IndexingFlag::new();
    assert!(flag.try_begin());
    let report = harness
        .coordinator
        .start_crawl(&flag)
        .await
        .expect("Crawl failed");
    assert!(!flag.is_running(), "flag is cleared after the run");
    report
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Every page is fetched exactly once even though links repeat
    mount_page(
        &mock_server,
        "/",
        r#"<p>Кошки живут дома.</p>
           <a href="/news">Новости</a>
           <a href="/about">О нас</a>
           <a href="/news">Новости снова</a>
           <a href="/">Главная</a>
           <a href="https://elsewhere.example/">Внешняя</a>"#,
        1,
    )
    .await;
    mount_page(
        &mock_server,
        "/news",
        r#"<p>Новости: кошка живет в доме.</p><a href="/">Главная</a><a href="/about">О нас</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/about", "<p>Дом кошек.</p>", 1).await;

    let harness = harness(&base_url);
    let report = crawl(&harness).await;

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].status, SiteStatus::Indexed);

    let site = harness
        .storage
        .find_site_by_url(&harness.config.sites[0].url)
        .unwrap()
        .expect("site record exists");
    assert_eq!(site.status, SiteStatus::Indexed);
    assert!(site.last_error.is_none());

    assert_eq!(harness.storage.count_pages(Some(site.id)).unwrap(), 3);
    for page_path in ["", "/news", "/about"] {
        let page = harness
            .storage
            .find_page(site.id, page_path)
            .unwrap()
            .unwrap_or_else(|| panic!("page {:?} stored", page_path));
        assert_eq!(page.code, 200);
        assert!(page.content.starts_with("<head>"));
    }

    let cat = harness.storage.find_lemma(site.id, "кошка").unwrap().unwrap();
    assert_eq!(cat.frequency, 3);
    let home = harness.storage.find_lemma(site.id, "дом").unwrap().unwrap();
    assert_eq!(home.frequency, 3);
    assert_frequency_invariant(&harness.storage, site.id, &["кошка", "дом", "жить", "новость"]);
}

#[tokio::test]
async fn test_404_page_is_stored_with_code() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Кошки</p><a href="/missing">?</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = harness(&base_url);
    crawl(&harness).await;

    let site = harness
        .storage
        .find_site_by_url(&harness.config.sites[0].url)
        .unwrap()
        .unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);

    let missing = harness.storage.find_page(site.id, "/missing").unwrap().unwrap();
    assert_eq!(missing.code, 404);
    assert!(missing.content.is_empty());
    assert!(harness
        .storage
        .find_entries_by_page(missing.id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unsupported_content_type_is_415() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Кошки</p><a href="/logo.png">logo</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47])
                .insert_header("content-type", "image/png"),
        )
        .mount(&mock_server)
        .await;

    let harness = harness(&base_url);
    crawl(&harness).await;

    let site = harness
        .storage
        .find_site_by_url(&harness.config.sites[0].url)
        .unwrap()
        .unwrap();
    let logo = harness.storage.find_page(site.id, "/logo.png").unwrap().unwrap();
    assert_eq!(logo.code, 415);
    assert!(logo.content.is_empty());
}

#[tokio::test]
async fn test_cleared_flag_aborts_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "<p>Кошки</p>", 0).await;

    let harness = harness(&base_url);
    let flag = IndexingFlag::new();
    let report = harness.coordinator.start_crawl(&flag).await.unwrap();

    assert_eq!(report.sites[0].status, SiteStatus::Failed);
    let site = harness
        .storage
        .find_site_by_url(&harness.config.sites[0].url)
        .unwrap()
        .unwrap();
    assert_eq!(site.status, SiteStatus::Failed);
    assert_eq!(site.last_error.as_deref(), Some(STOPPED_BY_USER));
    assert_eq!(harness.storage.count_pages(Some(site.id)).unwrap(), 0);
}

#[tokio::test]
async fn test_stop_during_crawl_keeps_finished_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Дом</p><a href="/slow">slow</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            html(r#"<p>Кошки</p><a href="/child">child</a>"#).set_delay(Duration::from_millis(800)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    // Never reached: the page linking to it is dropped before it is stored
    mount_page(&mock_server, "/child", "<p>Новости</p>", 0).await;

    let harness = harness(&base_url);
    let flag = IndexingFlag::new();
    assert!(flag.try_begin());

    let (report, stopped) = tokio::join!(harness.coordinator.start_crawl(&flag), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        flag.stop()
    });
    let report = report.unwrap();
    assert!(stopped, "the run was still in progress");
    assert!(!flag.is_running());

    assert_eq!(report.sites[0].status, SiteStatus::Failed);
    assert_eq!(report.sites[0].last_error.as_deref(), Some(STOPPED_BY_USER));

    let site = harness
        .storage
        .find_site_by_url(&harness.config.sites[0].url)
        .unwrap()
        .unwrap();
    assert_eq!(site.status, SiteStatus::Failed);
    assert_eq!(site.last_error.as_deref(), Some(STOPPED_BY_USER));

    // The root was stored before the stop, the slow page was fetched after it
    assert!(harness.storage.find_page(site.id, "").unwrap().is_some());
    assert!(harness.storage.find_page(site.id, "/slow").unwrap().is_none());
    assert_eq!(harness.storage.count_pages(Some(site.id)).unwrap(), 1);
    assert!(harness.storage.find_lemma(site.id, "дом").unwrap().is_some());
    assert!(harness.storage.find_lemma(site.id, "кошка").unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_during_crawl_shares_visited_paths() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Дом</p><a href="/slow">slow</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>Кошки</p>").set_delay(Duration::from_millis(1000)))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/extra", "<p>Новости</p>", 1).await;

    let harness = harness(&base_url);
    let site_url = harness.config.sites[0].url.clone();
    let flag = IndexingFlag::new();
    assert!(flag.try_begin());

    let (report, (busy, extra)) = tokio::join!(harness.coordinator.start_crawl(&flag), async {
        // By now the crawl has claimed /slow and waits for its response
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(harness.coordinator.is_crawling(&site_url));
        let busy = harness
            .coordinator
            .refresh_single_page(&format!("{}/slow", site_url), &IndexingFlag::new())
            .await;
        let extra = harness
            .coordinator
            .refresh_single_page(&format!("{}/extra", site_url), &IndexingFlag::new())
            .await;
        (busy, extra)
    });

    assert!(matches!(busy, Err(EngineError::PageBusy { ref path, .. }) if path == "/slow"));
    let extra = extra.unwrap();
    assert_eq!(extra.code, 200);

    let report = report.unwrap();
    assert_eq!(report.sites[0].status, SiteStatus::Indexed);
    assert!(!harness.coordinator.is_crawling(&site_url));

    let site = harness.storage.find_site_by_url(&site_url).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(extra.site_id, site.id);
    assert_eq!(harness.storage.count_pages(Some(site.id)).unwrap(), 3);
    assert!(harness.storage.find_lemma(site.id, "новость").unwrap().is_some());
    assert_frequency_invariant(&harness.storage, site.id, &["дом", "кошка", "новость"]);
}

#[tokio::test]
async fn test_crawl_waits_for_running_refresh() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Дом</p><a href="/page">page</a>"#, 1).await;
    // Fetched once by the refresh and once by the crawl that follows it
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html("<p>Кошки</p>").set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let harness = harness(&base_url);
    let site_url = harness.config.sites[0].url.clone();
    let flag = IndexingFlag::new();
    assert!(flag.try_begin());

    // The refresh is polled first and holds its site until the page is stored
    let page_url = format!("{}/page", site_url);
    let refresh_flag = IndexingFlag::new();
    let (refreshed, report) = tokio::join!(
        harness
            .coordinator
            .refresh_single_page(&page_url, &refresh_flag),
        harness.coordinator.start_crawl(&flag)
    );

    let refreshed = refreshed.unwrap();
    assert_eq!(refreshed.code, 200);
    let report = report.unwrap();
    assert_eq!(report.sites[0].status, SiteStatus::Indexed);

    // The crawl replaced the site the refresh wrote to
    let sites = harness.storage.find_all_sites().unwrap();
    assert_eq!(sites.len(), 1);
    assert_ne!(sites[0].id, refreshed.site_id);
    assert_eq!(harness.storage.count_pages(None).unwrap(), 2);

    let cat = harness.storage.find_lemma(sites[0].id, "кошка").unwrap().unwrap();
    assert_eq!(cat.frequency, 1);
    assert_frequency_invariant(&harness.storage, sites[0].id, &["дом", "кошка"]);
}

#[tokio::test]
async fn test_recrawl_replaces_site_data() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "<p>Кошки</p>", 2).await;

    let harness = harness(&base_url);
    crawl(&harness).await;
    let first = harness.storage.find_all_sites().unwrap();
    crawl(&harness).await;
    let second = harness.storage.find_all_sites().unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].id, second[0].id);

    let cat = harness
        .storage
        .find_lemma(second[0].id, "кошка")
        .unwrap()
        .unwrap();
    assert_eq!(cat.frequency, 1);
}

#[tokio::test]
async fn test_refresh_retracts_stale_counts() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Дом</p><a href="/page">page</a>"#, 1).await;
    mount_page(&mock_server, "/page", "<p>Дом дом дом дом</p>", 1).await;

    let harness = harness(&base_url);
    crawl(&harness).await;

    let site_url = harness.config.sites[0].url.clone();
    let site = harness.storage.find_site_by_url(&site_url).unwrap().unwrap();
    let home = harness.storage.find_lemma(site.id, "дом").unwrap().unwrap();
    assert_eq!(home.frequency, 5);

    // The page now talks about cats instead
    mock_server.reset().await;
    mount_page(&mock_server, "/page", "<p>Кошки</p>", 2).await;

    let page_url = format!("{}/page", site_url);
    let flag = IndexingFlag::new();
    let page = harness
        .coordinator
        .refresh_single_page(&page_url, &flag)
        .await
        .unwrap();
    assert_eq!(page.path, "/page");
    assert_eq!(page.code, 200);

    let home = harness.storage.find_lemma(site.id, "дом").unwrap().unwrap();
    assert_eq!(home.frequency, 1);
    assert!(harness.storage.find_entry(page.id, home.id).unwrap().is_none());
    let cat = harness.storage.find_lemma(site.id, "кошка").unwrap().unwrap();
    assert_eq!(cat.frequency, 1);

    // Refreshing unchanged content changes nothing
    harness
        .coordinator
        .refresh_single_page(&page_url, &flag)
        .await
        .unwrap();
    let cat = harness.storage.find_lemma(site.id, "кошка").unwrap().unwrap();
    assert_eq!(cat.frequency, 1);
    assert_eq!(harness.storage.find_entries_by_page(page.id).unwrap().len(), 1);
    assert_frequency_invariant(&harness.storage, site.id, &["дом", "кошка"]);

    let site = harness.storage.find_site_by_url(&site_url).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);
}

#[tokio::test]
async fn test_refresh_of_failing_page_clears_its_index() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<p>Дом</p><a href="/gone">gone</a>"#, 1).await;
    mount_page(&mock_server, "/gone", "<p>Кошки</p>", 1).await;

    let harness = harness(&base_url);
    crawl(&harness).await;

    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let site_url = harness.config.sites[0].url.clone();
    let page = harness
        .coordinator
        .refresh_single_page(&format!("{}/gone", site_url), &IndexingFlag::new())
        .await
        .unwrap();

    assert_eq!(page.code, 404);
    assert!(page.content.is_empty());
    let site = harness.storage.find_site_by_url(&site_url).unwrap().unwrap();
    let cat = harness.storage.find_lemma(site.id, "кошка").unwrap().unwrap();
    assert_eq!(cat.frequency, 0);
    assert!(harness.storage.find_entries_by_page(page.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_of_new_page_without_prior_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/fresh", "<p>Кошки живут</p>", 1).await;

    let harness = harness(&base_url);
    let site_url = harness.config.sites[0].url.clone();
    let page = harness
        .coordinator
        .refresh_single_page(&format!("{}/fresh", site_url), &IndexingFlag::new())
        .await
        .unwrap();
    assert_eq!(page.code, 200);

    let site = harness.storage.find_site_by_url(&site_url).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(harness.storage.count_pages(Some(site.id)).unwrap(), 1);
    assert!(harness.storage.find_lemma(site.id, "жить").unwrap().is_some());
}

#[tokio::test]
async fn test_refresh_outside_configured_sites() {
    let mock_server = MockServer::start().await;
    let harness = harness(&mock_server.uri());

    let result = harness
        .coordinator
        .refresh_single_page("https://unconfigured.example/page", &IndexingFlag::new())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::PageOutsideConfiguredSites(_))
    ));
}

#[tokio::test]
async fn test_search_after_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<p>Главная страница.</p><a href="/cats">Кошки</a><a href="/houses">Дома</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/cats", "<p>Кошки живут в доме.</p>", 1).await;
    mount_page(&mock_server, "/houses", "<p>Дом без кошек.</p><p>Пустой дом.</p>", 1).await;

    let harness = harness(&base_url);
    let engine = SearchEngine::new(
        harness.storage.clone(),
        extractor(),
        harness.config.search.clone(),
    );

    // Sites still being indexed cannot be searched
    harness
        .storage
        .insert_site("Mock", &harness.config.sites[0].url, SiteStatus::Indexing)
        .unwrap();
    assert!(matches!(
        engine.search(&SearchQuery::new("кошка")),
        Err(SearchError::IndexingNotFinished(_))
    ));

    crawl(&harness).await;

    let response = engine.search(&SearchQuery::new("кошки дом")).unwrap();
    // Every page carries both lemmas; the root through its link texts
    let uris: Vec<&str> = response.data.iter().map(|r| r.uri.as_str()).collect();
    assert!(uris.contains(&"/cats"));
    assert!(uris.contains(&"/houses"));
    assert_eq!(response.count, response.data.len());

    for result in &response.data {
        assert_eq!(result.site_name, "Mock");
        assert_eq!(result.title, "Mock");
        assert!(result.snippet.contains("<b>"));
        assert!(result.words_found >= 1);
    }

    // The count covers all results, not just the requested page
    let limited = engine
        .search(&SearchQuery::new("кошки дом").page(0, 1))
        .unwrap();
    assert_eq!(limited.count, response.count);
    assert_eq!(limited.data.len(), 1);

    let none = engine.search(&SearchQuery::new("новости")).unwrap();
    assert_eq!(none.count, 0);
    assert!(none.data.is_empty());
}
