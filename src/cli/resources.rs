//! CLI resource query handler.

use super::{FindArgs, GlobalArgs};
use crate::error::Result;
use crate::resources::Resource;
use crate::routes::FindOptions;

/// Handle `baas find <resource>`.
pub async fn handle_find(global: &GlobalArgs, args: FindArgs) -> Result<()> {
    let app = global.application()?;
    let resource: Resource = args
        .resource
        .parse()
        .unwrap_or(Resource::Custom(args.resource.clone()));
    let client = app.resource::<serde_json::Value>(resource)?;
    let options = FindOptions::builder()
        .maybe_search_query(args.search)
        .maybe_page(args.page)
        .maybe_rpp(args.rpp)
        .maybe_sort(args.sort)
        .maybe_embed(args.embed)
        .maybe_fields(args.fields)
        .build();

    let page = client.find(&options).await?;
    eprintln!(
        "{} of {} records (page {}, {} per page)",
        page.item.len(),
        page.total_records,
        page.page,
        page.rpp
    );
    println!("{}", serde_json::to_string_pretty(&page.item)?);
    Ok(())
}
