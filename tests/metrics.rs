//! Verifies trigger dispatch emits the expected metric keys.

use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use riflesso::{
    Affected, CacheContext, CachedQuery, MemoryStore, Mutation, MutationOptions, QueryOptions,
    Trigger,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Recipe {
    uuid: String,
    title: String,
}

#[tokio::test]
async fn dispatch_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let context = CacheContext::new();
    let store = Arc::new(MemoryStore::new());

    let get_recipes = CachedQuery::register(
        &context,
        |search_for: String| async move {
            Ok::<_, String>(vec![Recipe {
                uuid: "r-1".to_string(),
                title: format!("{search_for} skillet"),
            }])
        },
        QueryOptions::new(store).named("get_recipes"),
    )
    .expect("query registration");

    let add_recipe = Mutation::register(
        &context,
        |recipe: Recipe| async move { Ok::<_, String>(recipe) },
        MutationOptions::new().named("add_recipe"),
    )
    .expect("mutation registration");

    let delete_recipe = Mutation::register(
        &context,
        |_uuid: String| async move { Ok::<_, String>(()) },
        MutationOptions::new().named("delete_recipe"),
    )
    .expect("mutation registration");

    get_recipes.add_trigger(Trigger::invalidated_by(
        &add_recipe,
        |_recipe: &Recipe, _output, _status, cached_keys| Affected::keys(cached_keys.to_vec()),
    ));
    get_recipes.add_trigger(Trigger::updated_by(
        &delete_recipe,
        |_uuid: &String, _output, _status, cached_keys| Affected::keys(cached_keys.to_vec()),
        |cached: Vec<Recipe>, uuid: &String, _output, _status| {
            cached
                .into_iter()
                .filter(|recipe| recipe.uuid != *uuid)
                .collect()
        },
    ));

    // One invalidation dispatch and one update dispatch.
    get_recipes
        .execute("steak".to_string())
        .await
        .expect("execute");
    add_recipe
        .execute(Recipe {
            uuid: "r-2".to_string(),
            title: "t-bone steak".to_string(),
        })
        .await
        .expect("mutation");
    get_recipes
        .execute("steak".to_string())
        .await
        .expect("execute");
    delete_recipe
        .execute("r-1".to_string())
        .await
        .expect("mutation");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "riflesso_dispatch_ms",
        "riflesso_invalidated_keys_total",
        "riflesso_updated_keys_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
