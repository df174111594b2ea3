//! Three in-memory levels under each write policy.
//!
//! Run with `RUST_LOG=mlcache_storage=trace` to see the traversal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mlcache_storage::{
    CacheKey, CacheLevel, InMemoryLevel, LevelHandle, MultiLevelCache, ReadPolicy, TierConfig,
    TierResult, WritePolicy,
};
use tracing_subscriber::EnvFilter;

fn three_levels() -> (Vec<Arc<InMemoryLevel>>, Vec<LevelHandle>) {
    let levels: Vec<Arc<InMemoryLevel>> = ["l1", "l2", "l3"]
        .into_iter()
        .map(|name| Arc::new(InMemoryLevel::named(name)))
        .collect();
    let handles = levels
        .iter()
        .map(|level| Arc::clone(level) as LevelHandle)
        .collect();
    (levels, handles)
}

fn holders(levels: &[Arc<InMemoryLevel>], key: &str) -> Vec<String> {
    levels
        .iter()
        .filter(|level| level.contains(key))
        .map(|level| level.name().to_string())
        .collect()
}

#[tokio::main]
async fn main() -> TierResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let expires_at = Utc::now() + chrono::Duration::hours(1);
    let books = [
        (WritePolicy::WriteThrough, "metamorphosis", "franzkafka"),
        (WritePolicy::WriteAround, "cosmos", "carlsagan"),
        (WritePolicy::WriteBack, "thesirensoftitan", "kurtvonnegut"),
    ];

    for (write_policy, title, author) in books {
        let (levels, handles) = three_levels();
        let config = TierConfig::new(ReadPolicy::ReadThrough, write_policy)
            .with_max_value_size(1024)
            .with_background_reporting(true);
        let cache = MultiLevelCache::with_config(config, handles)?;

        let key = CacheKey::new(title);
        cache.store(&key, author.as_bytes(), expires_at).await?;
        println!("{write_policy}: after store -> {:?}", holders(&levels, title));

        let found = cache.fetch(&key).await?;
        let value = found
            .map(|hit| String::from_utf8_lossy(&hit.value).into_owned())
            .unwrap_or_default();
        println!("{write_policy}: fetch -> {value:?}, now at {:?}", holders(&levels, title));

        if write_policy == WritePolicy::WriteBack {
            tokio::time::sleep(Duration::from_millis(300)).await;
            println!("{write_policy}: after delay -> {:?}", holders(&levels, title));
        }

        println!("{write_policy}: stats -> {:?}", cache.stats());
        key.release();
    }

    Ok(())
}
