use anyhow::Result;
use clap::Args;
use clap::Subcommand;
use clap::ValueEnum;
use serde_json::json;
use storefront_search::FacetField;
use storefront_search::HttpBackend;
use storefront_search::Layout;
use storefront_search::LoadMoreTrigger;
use storefront_search::Product;
use storefront_search::SearchSession;
use storefront_search::SessionEvent;
use storefront_search::SortOption;
use storefront_search::Suggestion;
use storefront_search::WidgetConfig;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search products, optionally narrowed by filters
    Search(SearchArgs),

    /// Show ranked autocomplete suggestions for a query
    Suggest(SuggestArgs),

    /// Show facet counts and the price bound for the store
    Facets,

    /// List or edit recent searches
    Recent(RecentArgs),
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query; empty lists the catalog
    #[arg(value_name = "QUERY", default_value = "")]
    pub query: String,

    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<String>,

    #[arg(long = "brand", value_name = "NAME")]
    pub brands: Vec<String>,

    #[arg(long = "color", value_name = "NAME")]
    pub colors: Vec<String>,

    #[arg(long = "size", value_name = "NAME")]
    pub sizes: Vec<String>,

    #[arg(long = "tag", value_name = "NAME")]
    pub tags: Vec<String>,

    #[arg(long = "stock", value_name = "STATUS")]
    pub stock_status: Vec<String>,

    /// Only featured products
    #[arg(long)]
    pub featured: bool,

    /// Only products on sale
    #[arg(long)]
    pub on_sale: bool,

    #[arg(long, value_name = "N")]
    pub min_price: Option<f64>,

    #[arg(long, value_name = "N")]
    pub max_price: Option<f64>,

    /// default, name-asc, name-desc, price-asc or price-desc
    #[arg(long, default_value_t = SortOption::Default)]
    pub sort: SortOption,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
}

#[derive(Debug, Args)]
pub struct RecentArgs {
    /// Remove every recent search
    #[arg(long, conflicts_with = "remove")]
    pub clear: bool,

    /// Remove one recent search
    #[arg(long, value_name = "TERM")]
    pub remove: Option<String>,
}

pub async fn run(command: Command, config: WidgetConfig) -> Result<()> {
    match command {
        Command::Search(args) => run_search(args, config).await,
        Command::Suggest(args) => run_suggest(args, config).await,
        Command::Facets => run_facets(config).await,
        Command::Recent(args) => {
            run_recent(args, config);
            Ok(())
        }
    }
}

async fn run_search(args: SearchArgs, config: WidgetConfig) -> Result<()> {
    let backend = HttpBackend::new(&config)?;
    let mut session = SearchSession::from_config(config);
    session.bootstrap(&backend).await;

    // Filters are staged before the query, so nothing is fetched yet.
    let selections = [
        (FacetField::Category, &args.categories),
        (FacetField::Brand, &args.brands),
        (FacetField::Color, &args.colors),
        (FacetField::Size, &args.sizes),
        (FacetField::Tag, &args.tags),
        (FacetField::StockStatus, &args.stock_status),
    ];
    for (field, values) in selections {
        for value in values {
            session.toggle_filter(field, value);
        }
    }
    if args.featured {
        session.toggle_featured();
    }
    if args.on_sale {
        session.toggle_on_sale();
    }
    if args.min_price.is_some() || args.max_price.is_some() {
        let current = session.filters().price_range;
        session.set_price_range(
            args.min_price.unwrap_or(current.min),
            args.max_price.unwrap_or(current.max),
        );
    }
    session.set_sort(args.sort);

    session.dispatch(SessionEvent::QueryEdited(args.query.clone()));
    let commands = session.dispatch(SessionEvent::Submit);
    session.drive(&backend, commands).await;

    for _ in 1..args.pages {
        let Some(command) = session.load_more(LoadMoreTrigger::Button, Layout::Wide) else {
            break;
        };
        session.drive(&backend, vec![command]).await;
    }
    info!(
        items = session.results().displayed_count(),
        page = session.results().page,
        "search finished"
    );

    match args.format {
        OutputFormat::Json => {
            let results = session.results();
            let body = json!({
                "query": session.query(),
                "total": results.total,
                "page": results.page,
                "hasMore": results.has_more,
                "products": session.sorted_results(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            let results = session.results();
            if results.items.is_empty() {
                println!("No results for \"{}\"", session.query());
                return Ok(());
            }
            for product in session.sorted_results() {
                println!("{}", render_product(product));
            }
            println!(
                "-- showing {} of {}{}",
                results.displayed_count(),
                results.total,
                if results.has_more { " (more available)" } else { "" }
            );
        }
    }
    Ok(())
}

async fn run_suggest(args: SuggestArgs, config: WidgetConfig) -> Result<()> {
    let backend = HttpBackend::new(&config)?;
    let mut session = SearchSession::from_config(config);
    session.dispatch(SessionEvent::QueryEdited(args.query));
    session.settle(&backend).await;
    for line in render_suggestions(session.suggestions()) {
        println!("{line}");
    }
    Ok(())
}

async fn run_facets(config: WidgetConfig) -> Result<()> {
    let backend = HttpBackend::new(&config)?;
    let mut session = SearchSession::from_config(config);
    session.bootstrap(&backend).await;
    let body = json!({
        "facets": session.facets(),
        "optionalFacets": session.optional_facets(),
        "maxPrice": session.max_price(),
        "popularSearches": session.popular_searches(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn run_recent(args: RecentArgs, config: WidgetConfig) {
    let mut session = SearchSession::from_config(config);
    if args.clear {
        session.clear_recent();
        return;
    }
    if let Some(term) = args.remove {
        if !session.remove_recent(&term) {
            println!("\"{term}\" is not a recent search");
        }
        return;
    }
    for (index, term) in session.recent_searches().iter().enumerate() {
        println!("{:>2}. {term}", index + 1);
    }
}

fn render_product(product: &Product) -> String {
    let mut line = product.title.clone();
    if let Some(price) = product.price.as_deref().filter(|p| !p.is_empty()) {
        line.push_str(&format!("  {price}"));
    }
    if product.is_on_sale() {
        if let Some(discount) = product.discount_percentage() {
            line.push_str(&format!("  -{discount}%"));
        }
    }
    if let Some(link) = product.link() {
        line.push_str(&format!("  <{link}>"));
    }
    line
}

fn render_suggestions(suggestions: &[Suggestion]) -> Vec<String> {
    suggestions
        .iter()
        .map(|s| format!("{:>3}  {}", s.score, s.text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn search_flags_parse() {
        let cli = TestCli::try_parse_from([
            "storefront",
            "search",
            "blue shirt",
            "--color",
            "blue",
            "--color",
            "navy",
            "--on-sale",
            "--max-price",
            "50",
            "--sort",
            "price-asc",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.query, "blue shirt");
        assert_eq!(args.colors, vec!["blue", "navy"]);
        assert!(args.on_sale);
        assert_eq!(args.max_price, Some(50.0));
        assert_eq!(args.sort, SortOption::PriceAsc);
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[test]
    fn recent_clear_and_remove_conflict() {
        assert!(
            TestCli::try_parse_from(["storefront", "recent", "--clear", "--remove", "a"]).is_err()
        );
    }

    #[test]
    fn product_line_shows_discount_and_link() {
        let product = Product {
            id: "1".to_string(),
            title: "Linen Shirt".to_string(),
            price: Some("30.00".to_string()),
            regular_price: Some("40.00".to_string()),
            sale_price: Some("30.00".to_string()),
            product_url: Some("https://shop.example.com/p/linen".to_string()),
            ..Default::default()
        };
        assert_eq!(
            render_product(&product),
            "Linen Shirt  30.00  -25%  <https://shop.example.com/p/linen>"
        );
    }

    #[test]
    fn suggestions_render_with_scores() {
        let suggestions = vec![
            Suggestion {
                text: "shirt".to_string(),
                score: 100,
            },
            Suggestion {
                text: "t-shirt".to_string(),
                score: 70,
            },
        ];
        assert_eq!(
            render_suggestions(&suggestions),
            vec!["100  shirt", " 70  t-shirt"]
        );
    }
}
