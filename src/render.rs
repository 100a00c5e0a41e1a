//! Server-side HTML for the catalog, detail and watch pages.
use crate::catalog::{CatalogResult, CatalogState, CatalogView, NO_RESULTS_MESSAGE};
use crate::models::{ContentType, MovieDetail, ShowDetail, Title};
use crate::playback::{PlaybackSelector, NO_EPISODES_MESSAGE};
use crate::tmdb::poster_url;
use std::fmt::Write;

const SITE_NAME: &str = "Yassuflix";
const CARD_WIDTH: &str = "w500";

const STYLE: &str = "body{margin:0;background:#111827;color:#fff;font-family:system-ui,sans-serif}\
header,footer{display:flex;flex-wrap:wrap;gap:1rem;justify-content:space-between;align-items:center;padding:1.5rem 2rem;border-color:#374151}\
header{border-bottom:1px solid #374151}footer{border-top:1px solid #374151;justify-content:center}\
h1.brand{font-size:2.25rem;margin:0;color:#a78bfa}\
a{color:inherit;text-decoration:none}\
.pill{display:inline-block;padding:.5rem 1rem;border-radius:9999px;background:#374151;color:#d1d5db;font-weight:600}\
.pill.active{background:#7c3aed;color:#fff}.pill.disabled{opacity:.5;pointer-events:none}\
input[type=search]{width:100%;max-width:28rem;background:#1f2937;color:#fff;border:1px solid #374151;border-radius:9999px;padding:.5rem 1.5rem}\
main{padding:2rem}.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(10rem,1fr));gap:1.5rem}\
.card{position:relative;border-radius:.75rem;overflow:hidden;background:#1f2937}\
.card img,.card .poster{aspect-ratio:2/3;width:100%;object-fit:cover;display:block}\
.card .meta{padding:.75rem}.card h2{font-size:1rem;margin:0;white-space:nowrap;overflow:hidden;text-overflow:ellipsis}\
.muted{color:#9ca3af}.center{text-align:center;padding:2.5rem}\
.player{position:relative;padding-top:56.25%;width:100%;max-width:56rem}\
.player iframe{position:absolute;inset:0;width:100%;height:100%;border:0}\
.page{display:flex;flex-direction:column;align-items:center;padding:1rem;gap:1rem}\
.picker{display:flex;flex-wrap:wrap;gap:.5rem;max-width:56rem;width:100%}\
.detail{display:flex;flex-wrap:wrap;gap:2rem;max-width:56rem}.detail img{width:18rem;border-radius:.75rem}\
.loading{text-align:center;padding:1rem 0 0}.loading[hidden]{display:none}\
.loading::before{content:'';display:inline-block;width:1.25rem;height:1.25rem;margin-right:.5rem;vertical-align:middle;\
border:3px solid #4b5563;border-top-color:#a78bfa;border-radius:50%;animation:spin 1s linear infinite}\
@keyframes spin{to{transform:rotate(360deg)}}";

const LIVE_SEARCH_SCRIPT: &str = r#"(function(){
var form=document.getElementById('search');if(!form)return;
var input=form.querySelector('input[name=q]');
var results=document.getElementById('results');var loading=document.getElementById('loading');
var key=sessionStorage.getItem('catalog-session');
if(!key){key=Math.random().toString(36).slice(2);sessionStorage.setItem('catalog-session',key);}
var pending=0;
function busy(delta){pending+=delta;results.setAttribute('aria-busy',pending>0?'true':'false');loading.hidden=pending===0;}
function send(params){
params.session=key;busy(1);
fetch('/catalog/live?'+new URLSearchParams(params))
.then(function(r){if(r.status===200){return r.text().then(function(html){results.innerHTML=html;});}})
.catch(function(){})
.then(function(){busy(-1);});
}
input.addEventListener('input',function(){send({type:form.dataset.type,q:input.value,page:'1'});});
results.addEventListener('click',function(e){
var link=e.target.closest('a[data-action]');if(!link)return;e.preventDefault();
send({action:link.dataset.action,type:link.dataset.type,q:link.dataset.q,page:link.dataset.page});
});})();"#;

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
<title>{}</title><style>{STYLE}</style></head><body>{body}</body></html>",
        escape(title)
    )
}

fn back_link() -> &'static str {
    "<div class=\"picker\"><a class=\"pill\" href=\"/\">&larr; Back to Home</a></div>"
}

fn catalog_href(state: &CatalogState, page: u32) -> String {
    let mut href = format!("/?type={}&page={}", state.content_type, page);
    if !state.query.trim().is_empty() {
        let _ = write!(href, "&q={}", urlencoding::encode(state.query.trim()));
    }
    href
}

fn year_label(title: &Title) -> String {
    title
        .year()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn card(title: &Title, kind: ContentType, image_base: &str) -> String {
    let poster = match poster_url(image_base, title.poster_path.as_deref(), CARD_WIDTH) {
        Some(url) => format!(
            "<img src=\"{}\" alt=\"{}\" loading=\"lazy\">",
            escape(&url),
            escape(&title.name)
        ),
        None => "<div class=\"poster\"></div>".to_string(),
    };
    format!(
        "<a class=\"card\" href=\"/{}/{}\">{poster}<div class=\"meta\"><h2>{}</h2><p class=\"muted\">{}</p></div></a>",
        kind,
        title.id,
        escape(&title.name),
        year_label(title)
    )
}

pub fn catalog_grid(view: &CatalogView, image_base: &str) -> String {
    match &view.result {
        CatalogResult::Loaded { page } => {
            let mut out = String::from("<div class=\"grid\">");
            for title in &page.results {
                out.push_str(&card(title, view.state.content_type, image_base));
            }
            out.push_str("</div>");
            out
        }
        CatalogResult::Empty => format!("<p class=\"muted center\">{NO_RESULTS_MESSAGE}</p>"),
        CatalogResult::Failed { message } => {
            format!("<p class=\"muted center\" role=\"alert\">{}</p>", escape(message))
        }
    }
}

fn page_link(state: &CatalogState, action: &str, page: u32, label: &str) -> String {
    format!(
        "<a class=\"pill\" href=\"{}\" data-action=\"{action}\" data-type=\"{}\" data-q=\"{}\" data-page=\"{}\">{label}</a>",
        escape(&catalog_href(state, page)),
        state.content_type,
        escape(state.query.trim()),
        state.page,
    )
}

fn pager(state: &CatalogState) -> String {
    let mut out = String::from("<footer>");
    if state.page > 1 {
        out.push_str(&page_link(state, "prev", state.page - 1, "Previous Page"));
    } else {
        out.push_str("<span class=\"pill disabled\" aria-disabled=\"true\">Previous Page</span>");
    }
    let _ = write!(out, "<span class=\"muted\">Page {}</span>", state.page);
    out.push_str(&page_link(state, "next", state.page.saturating_add(1), "Next Page"));
    out.push_str("</footer>");
    out
}

/// Grid plus pager. The live routes swap this whole block so the page
/// number and its links never lag behind the results.
pub fn catalog_results(view: &CatalogView, image_base: &str) -> String {
    format!("<main>{}</main>{}", catalog_grid(view, image_base), pager(&view.state))
}

pub fn catalog_page(view: &CatalogView, image_base: &str) -> String {
    let state = &view.state;
    let mut body = String::new();
    body.push_str("<header>");
    let _ = write!(body, "<h1 class=\"brand\">{SITE_NAME}</h1><nav class=\"picker\" style=\"width:auto\">");
    for kind in [ContentType::Movie, ContentType::Tv] {
        let class = if kind == state.content_type { "pill active" } else { "pill" };
        let _ = write!(body, "<a class=\"{class}\" href=\"/?type={kind}\">{}</a>", kind.label());
    }
    body.push_str("</nav>");
    let _ = write!(
        body,
        "<form id=\"search\" action=\"/\" method=\"get\" data-type=\"{kind}\" style=\"flex:1;max-width:28rem\">\
<input type=\"hidden\" name=\"type\" value=\"{kind}\">\
<input type=\"search\" name=\"q\" value=\"{}\" placeholder=\"Search for a {}...\" autocomplete=\"off\"></form>",
        escape(&state.query),
        state.content_type.singular(),
        kind = state.content_type,
    );
    body.push_str("</header>");

    body.push_str("<div id=\"loading\" class=\"loading muted\" role=\"status\" hidden>Loading...</div>");
    let _ = write!(
        body,
        "<div id=\"results\" aria-busy=\"false\">{}</div>",
        catalog_results(view, image_base)
    );
    let _ = write!(body, "<script>{LIVE_SEARCH_SCRIPT}</script>");

    layout(SITE_NAME, &body)
}

fn detail_body(
    title: &Title,
    image_base: &str,
    tagline: Option<&str>,
    facts: &[String],
    watch_href: &str,
) -> String {
    let mut body = String::from("<div class=\"page\">");
    body.push_str(back_link());
    body.push_str("<div class=\"detail\">");
    if let Some(url) = poster_url(image_base, title.poster_path.as_deref(), CARD_WIDTH) {
        let _ = write!(body, "<img src=\"{}\" alt=\"{}\">", escape(&url), escape(&title.name));
    }
    let _ = write!(body, "<div><h1>{}</h1>", escape(&title.name));
    if let Some(tagline) = tagline {
        let _ = write!(body, "<p class=\"muted\"><em>{}</em></p>", escape(tagline));
    }
    let mut line = vec![year_label(title)];
    if let Some(vote) = title.vote_average {
        line.push(format!("{vote:.1}/10"));
    }
    line.extend(facts.iter().cloned());
    let _ = write!(body, "<p class=\"muted\">{}</p>", escape(&line.join(" · ")));
    if !title.overview.is_empty() {
        let _ = write!(body, "<p>{}</p>", escape(&title.overview));
    }
    let _ = write!(body, "<a class=\"pill active\" href=\"{watch_href}\">&#9654; Watch</a>");
    body.push_str("</div></div></div>");
    body
}

pub fn movie_detail_page(movie: &MovieDetail, image_base: &str) -> String {
    let mut facts = Vec::new();
    if let Some(runtime) = movie.runtime_minutes {
        facts.push(format!("{runtime} min"));
    }
    if !movie.genres.is_empty() {
        facts.push(movie.genres.join(", "));
    }
    let body = detail_body(
        &movie.title,
        image_base,
        movie.tagline.as_deref(),
        &facts,
        &format!("/watch/{}", movie.title.id),
    );
    layout(&movie.title.name, &body)
}

pub fn show_detail_page(show: &ShowDetail, image_base: &str) -> String {
    let mut facts = Vec::new();
    if let Some(n) = show.number_of_seasons {
        facts.push(if n == 1 { "1 season".to_string() } else { format!("{n} seasons") });
    }
    if !show.genres.is_empty() {
        facts.push(show.genres.join(", "));
    }
    let body = detail_body(
        &show.title,
        image_base,
        None,
        &facts,
        &format!("/watch/tv/{}", show.title.id),
    );
    layout(&show.title.name, &body)
}

fn player(embed_url: &str, title: &str) -> String {
    format!(
        "<div class=\"player\"><iframe src=\"{}\" title=\"{}\" allowfullscreen></iframe></div>",
        escape(embed_url),
        escape(title)
    )
}

pub fn watch_movie_page(movie: &MovieDetail, embed_url: &str) -> String {
    let body = format!(
        "<div class=\"page\">{}<h1>{}</h1>{}</div>",
        back_link(),
        escape(&movie.title.name),
        player(embed_url, &movie.title.name)
    );
    layout(&movie.title.name, &body)
}

pub fn watch_show_page(show: &ShowDetail, selector: &PlaybackSelector, embed_url: &str) -> String {
    let id = show.title.id;
    let mut body = String::from("<div class=\"page\">");
    body.push_str(back_link());
    let _ = write!(body, "<h1>{}</h1>", escape(&show.title.name));
    body.push_str(&player(embed_url, &show.title.name));

    body.push_str("<h2>Select Season</h2><div class=\"picker\">");
    for season in selector.seasons() {
        let n = season.season_number;
        let class = if n == selector.selected_season() { "pill active" } else { "pill" };
        let _ = write!(body, "<a class=\"{class}\" href=\"/watch/tv/{id}?season={n}\">S{n}</a>");
    }
    body.push_str("</div>");

    body.push_str("<h2>Select Episode</h2><div class=\"picker\">");
    let episodes = selector.episodes();
    if episodes.is_empty() {
        let _ = write!(body, "<p class=\"muted\">{NO_EPISODES_MESSAGE}</p>");
    }
    let season = selector.selected_season();
    for e in episodes {
        let class = if e == selector.selected_episode() { "pill active" } else { "pill" };
        let _ = write!(
            body,
            "<a class=\"{class}\" href=\"/watch/tv/{id}?season={season}&amp;episode={e}\">E{e}</a>"
        );
    }
    body.push_str("</div></div>");
    layout(&show.title.name, &body)
}

pub fn not_found_page() -> String {
    let body = format!(
        "<div class=\"page\"><h1>404</h1><p class=\"muted\">This title could not be found.</p>{}</div>",
        back_link()
    );
    layout(&format!("Not found · {SITE_NAME}"), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogPage, Season};

    fn title(id: u64, name: &str) -> Title {
        Title {
            id,
            name: name.to_string(),
            poster_path: Some("/p.jpg".to_string()),
            date: Some("2010-07-16".to_string()),
            vote_average: Some(8.8),
            overview: "Dreams <within> dreams".to_string(),
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn catalog_page_links_cards_and_disables_prev_on_first_page() {
        let view = CatalogView {
            state: CatalogState::new(ContentType::Tv, "", 1),
            result: CatalogResult::Loaded {
                page: CatalogPage {
                    page: 1,
                    total_pages: None,
                    results: vec![title(1399, "Game of Thrones")],
                },
            },
        };
        let html = catalog_page(&view, "https://image.tmdb.org/t/p");
        assert!(html.contains("href=\"/tv/1399\""));
        assert!(html.contains("https://image.tmdb.org/t/p/w500/p.jpg"));
        assert!(html.contains("aria-disabled=\"true\">Previous Page"));
        assert!(html.contains("/?type=tv&amp;page=2"));
    }

    #[test]
    fn catalog_page_marks_live_requests_in_flight() {
        let view = CatalogView {
            state: CatalogState::default(),
            result: CatalogResult::Empty,
        };
        let html = catalog_page(&view, "");
        assert!(html.contains("<div id=\"loading\" class=\"loading muted\" role=\"status\" hidden>"));
        assert!(html.contains("<div id=\"results\" aria-busy=\"false\">"));
        // Raised before the request, lowered on every outcome including 204 and network errors.
        let raise = LIVE_SEARCH_SCRIPT.find("busy(1);fetch(").unwrap();
        let lower = LIVE_SEARCH_SCRIPT.find(".then(function(){busy(-1);})").unwrap();
        assert!(raise < lower);
        assert!(LIVE_SEARCH_SCRIPT.contains(".catch(function(){})"));
        assert!(LIVE_SEARCH_SCRIPT.contains("loading.hidden=pending===0"));
    }

    #[test]
    fn results_fragment_carries_its_own_pager() {
        let view = CatalogView {
            state: CatalogState::new(ContentType::Movie, "alien", 2),
            result: CatalogResult::Empty,
        };
        let html = catalog_results(&view, "");
        assert!(html.starts_with("<main>"));
        assert!(html.contains("<span class=\"muted\">Page 2</span>"));
        assert!(html.contains(
            "href=\"/?type=movie&amp;page=1&amp;q=alien\" data-action=\"prev\" data-type=\"movie\" data-q=\"alien\" data-page=\"2\""
        ));
        assert!(html.contains("href=\"/?type=movie&amp;page=3&amp;q=alien\" data-action=\"next\""));
    }

    #[test]
    fn next_link_saturates_on_last_page_number() {
        let view = CatalogView {
            state: CatalogState::new(ContentType::Movie, "", u32::MAX),
            result: CatalogResult::Empty,
        };
        let html = catalog_results(&view, "");
        assert!(html.contains(&format!("Page {}", u32::MAX)));
        assert!(html.contains(&format!("/?type=movie&amp;page={}\" data-action=\"next\"", u32::MAX)));
    }

    #[test]
    fn grid_shows_empty_and_failure_states() {
        let empty = CatalogView {
            state: CatalogState::default(),
            result: CatalogResult::Empty,
        };
        assert!(catalog_grid(&empty, "").contains(NO_RESULTS_MESSAGE));

        let failed = CatalogView {
            state: CatalogState::default(),
            result: CatalogResult::Failed {
                message: "down".to_string(),
            },
        };
        assert!(catalog_grid(&failed, "").contains("role=\"alert\">down"));
    }

    #[test]
    fn watch_show_page_lists_seasons_and_empty_episode_state() {
        let show = ShowDetail {
            title: title(1399, "Game of Thrones"),
            number_of_seasons: Some(2),
            genres: vec![],
            seasons: vec![
                Season { id: 1, season_number: 1, episode_count: 2, name: None },
                Season { id: 2, season_number: 2, episode_count: 0, name: None },
            ],
        };
        let selector = PlaybackSelector::new(&show.seasons);
        let html = watch_show_page(&show, &selector, "https://vidsrc.to/embed/tv/1399/2/1");
        assert!(html.contains("href=\"/watch/tv/1399?season=1\">S1"));
        assert!(html.contains("class=\"pill active\" href=\"/watch/tv/1399?season=2\">S2"));
        assert!(html.contains(NO_EPISODES_MESSAGE));
        assert!(html.contains("src=\"https://vidsrc.to/embed/tv/1399/2/1\""));
    }

    #[test]
    fn detail_page_links_to_watch_route() {
        let movie = MovieDetail {
            title: title(550, "Fight Club"),
            tagline: Some("Mischief. Mayhem. Soap.".to_string()),
            runtime_minutes: Some(139),
            genres: vec!["Drama".to_string()],
        };
        let html = movie_detail_page(&movie, "https://image.tmdb.org/t/p");
        assert!(html.contains("href=\"/watch/550\""));
        assert!(html.contains("Dreams &lt;within&gt; dreams"));
        assert!(html.contains("139 min"));
        assert!(html.contains("Mischief. Mayhem. Soap."));
    }
}
