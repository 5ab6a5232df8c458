#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Copy Everything",
        commands: &[
            "redis-sync -H 10.0.0.5 -P 6379 -h 127.0.0.1 -p 6380",
            "redis-sync -H prod.internal -P 6379 -h replica.internal -p 6379 --dest-db 1",
        ],
    },
    ExampleGroup {
        title: "Safer Runs",
        commands: &[
            "redis-sync -H prod -P 6379 -h ro -p 6380 --dry-run                 # Read only, report what would be copied",
            "redis-sync -H prod -P 6379 -h ro -p 6380 --require-marker element_cache_production_marker",
            "redis-sync -H prod -P 6379 -h ro -p 6380 --existing skip --on-error abort",
        ],
    },
    ExampleGroup {
        title: "Scripting",
        commands: &[
            "redis-sync --config sync.toml --output json",
            "redis-sync --config sync.toml --match 'session:*' --ttl drop -q",
        ],
    },
];
