use std::sync::Arc;

use stratum_core::{Config, EnvSource, FileSource, Schema, Sources, ValidationErrorKind, Value};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> FileSource {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write");
    FileSource::required(path)
}

#[test]
fn later_sources_override_earlier_ones() {
    let tmp = TempDir::new().expect("tmp");
    let a = write(&tmp, "a.json", r#"{"x": 1}"#);
    let b = write(&tmp, "b.toml", "x = 2\n");
    let env = EnvSource::new("APP").with_vars([("APP_X", "3")]);

    let files_only = Sources::new().file(a.clone()).file(b.clone());
    let with_env = files_only.clone().env(env);
    let with_cli = with_env.clone().args(["--x", "4"]);

    let value = |sources: &Sources| {
        Config::from_sources(sources)
            .expect("load")
            .get_int("x")
            .expect("x")
    };
    assert_eq!(value(&with_cli), 4);
    assert_eq!(value(&with_env), 3);
    assert_eq!(value(&files_only), 2);
    assert_eq!(value(&Sources::new().file(a)), 1);
}

#[test]
fn later_sources_replace_the_shape_of_earlier_keys() {
    let tmp = TempDir::new().expect("tmp");
    let file = write(
        &tmp,
        "base.json",
        r#"{"tags": {"a": 1}, "log": {"level": "info"}, "db": {"port": 1}}"#,
    );
    let env = EnvSource::new("APP").with_vars([("APP_DB_HOST", "env-host")]);
    let files_and_env = Sources::new().file(file).env(env);

    let config = Config::from_sources(&files_and_env).expect("load");
    assert_eq!(config.get_string("db.host").expect("env host"), "env-host");
    assert_eq!(config.get_int("db.port").expect("file port"), 1);

    let with_cli = files_and_env.args([
        "--tags=[1,2]",
        "--log=off",
        r#"--db={"host": "cli-host"}"#,
    ]);
    let config = Config::from_sources(&with_cli).expect("load");

    assert_eq!(config.get_array("tags").expect("tags"), vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(config.get("log"), Some(Value::from("off")));
    assert_eq!(config.get_string("db.host").expect("cli host"), "cli-host");
    assert!(config.get("db.port").is_none());
}

#[test]
fn toml_file_and_prefixed_environment() {
    let tmp = TempDir::new().expect("tmp");
    let file = write(
        &tmp,
        "config.toml",
        "[database]\nhost=\"localhost\"\nport=5432\n",
    );
    let env = EnvSource::new("APP")
        .with_separator("__")
        .with_vars([("APP__DATABASE__HOST", "prod.example.com")]);

    let config = Config::from_sources(&Sources::new().file(file).env(env)).expect("load");
    assert_eq!(
        config.get_string_or("database.host", "x").expect("host"),
        "prod.example.com"
    );
    assert_eq!(config.get_int_or("database.port", 0).expect("port"), 5432);
}

#[test]
fn required_file_failure_aborts_and_optional_is_skipped() {
    let tmp = TempDir::new().expect("tmp");
    let good = write(&tmp, "good.json", r#"{"ok": true}"#);
    let missing_optional = FileSource::optional(tmp.path().join("nope.json"));
    let missing_required = FileSource::required(tmp.path().join("nope.toml"));

    let config = Config::from_sources(&Sources::new().file(good.clone()).file(missing_optional))
        .expect("optional skipped");
    assert!(config.get_bool("ok").expect("ok"));

    let mut config = Config::new();
    config.set("kept", 1).expect("set");
    let result = config.load(&Sources::new().file(good).file(missing_required));
    assert!(result.is_err());
    assert!(config.get("ok").is_none());
    assert_eq!(config.get("kept"), Some(Value::Int(1)));
}

#[test]
fn schema_checks_the_merged_result() {
    let tmp = TempDir::new().expect("tmp");
    let file = write(
        &tmp,
        "service.toml",
        "[database]\nport = 5432\n\n[[servers]]\nname = \"a\"\n",
    );

    let schema = Arc::new(
        Schema::object()
            .field(
                "database",
                Schema::object()
                    .field("host", Schema::string().required())
                    .field("port", Schema::int().max(65535.0))
                    .build(),
            )
            .field(
                "servers",
                Schema::array(Schema::object().field("name", Schema::string()).build()),
            )
            .field("log_level", Schema::string().with_default("info"))
            .build(),
    );

    let mut config = Config::from_sources(&Sources::new().file(file)).expect("load");
    config.set_schema(Arc::clone(&schema));

    let result = config.validate();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ValidationErrorKind::MissingRequiredField);
    assert_eq!(result.errors[0].path, "database.host");
    assert_eq!(config.get_string("log_level").expect("default"), "info");

    config.set("database.host", "db").expect("set");
    assert!(config.validate().is_valid());

    let other = Config::new().with_schema(schema);
    assert!(other.validate().is_valid());
}

#[test]
fn cli_json_values_are_addressable() {
    let config = Config::from_sources(
        &Sources::new().args(["--limits={\"cpu\": 2, \"mem\": \"1G\"}", "--tags=[\"x\"]"]),
    )
    .expect("load");

    assert_eq!(config.get_int("limits.cpu").expect("cpu"), 2);
    assert_eq!(config.get_string("tags.0").expect("tag"), "x");
    assert_eq!(config.get_array("tags").expect("tags").len(), 1);
}
