/// Integration tests for compiling with async loaders

use embers_compiler::{
    compile_async, render_async, render_file_async, CompileError, CompileOptions, FsLoader, MemoryLoader,
    RenderError,
};
use serde_json::json;

#[tokio::test]
async fn test_render_file_async_from_disk() {
    let locals = json!({"pets": [{"name": "tobi"}, {"name": "loki"}, {"name": "jane"}]});
    let out = render_file_async("tests/fixtures/menu.ejs", &CompileOptions::new(), &FsLoader::new(), &locals)
        .await
        .unwrap();
    let expected = std::fs::read_to_string("tests/fixtures/menu.html").unwrap().replace('\r', "");
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_render_async_with_memory_loader() {
    let loader = MemoryLoader::new()
        .with("site/layout.ejs", "<body><% include parts/nav %><% include parts/footer %></body>")
        .with("site/parts/nav.ejs", "<nav><%= title %></nav>")
        .with("site/parts/footer.ejs", "<footer><% include ../legal.txt %></footer>")
        .with("site/legal.txt", "(c) <%= year %>");
    let options = CompileOptions::new().filename("site/layout.ejs");
    let source = "<% include layout %>";
    let root = CompileOptions::new().filename("site/index.ejs");

    let out = render_async(source, &root, &loader, &json!({"title": "Home"})).await.unwrap();
    assert_eq!(out, "<body><nav>Home</nav><footer>(c) <%= year %></footer></body>");

    let template = compile_async("<%= 1 %>", &options, &loader).await.unwrap();
    assert_eq!(template.filename(), Some("site/layout.ejs"));
}

#[tokio::test]
async fn test_async_include_not_found() {
    let loader = MemoryLoader::new().with("index.ejs", "<% include nope %>");
    let err = render_file_async("index.ejs", &CompileOptions::new(), &loader, &json!({}))
        .await
        .unwrap_err();
    match err {
        RenderError::Compile(CompileError::IncludeNotFound { path, from, .. }) => {
            assert_eq!(path, "nope.ejs");
            assert_eq!(from, "index.ejs");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_async_circular_include() {
    let loader = MemoryLoader::new()
        .with("a.ejs", "<% include b %>")
        .with("b.ejs", "<% include c %>")
        .with("c.ejs", "<% include a %>");
    let err = render_file_async("a.ejs", &CompileOptions::new(), &loader, &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Circular include: a.ejs -> b.ejs -> c.ejs -> a.ejs");
}

#[tokio::test]
async fn test_async_scan_error_is_reported() {
    let loader = MemoryLoader::new();
    let options = CompileOptions::new().filename("broken.ejs");
    let err = compile_async("ok\n<%= oops", &options, &loader).await.unwrap_err();
    assert_eq!(err.to_string(), "broken.ejs:2: Could not find matching close tag \"%>\".");
}
