fn main() {
    // Generate the scriptlet parser from src/embers.lalrpop into OUT_DIR
    lalrpop::Configuration::new()
        .use_cargo_dir_conventions()
        .emit_rerun_directives(true)
        .process()
        .expect("Failed to generate parser");
}
