use anyhow::Result;

fn main() -> Result<()> {
    tribox::cli::run()
}
