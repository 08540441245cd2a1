//! `wrenbind glue`: print the glue generated for the demo bindings.

use anyhow::bail;
use wrenbind::Session;

use crate::demo;

pub fn execute(module: Option<&str>) -> anyhow::Result<()> {
    let mut session = Session::new();
    demo::declare(&mut session)?;

    let modules: Vec<String> = match module {
        Some(name) if session.glue(name).is_none() => bail!("No bindings for module '{}'", name),
        Some(name) => vec![name.to_string()],
        None => session.modules().into_iter().map(str::to_string).collect(),
    };
    for name in modules {
        if let Some(glue) = session.glue(&name) {
            println!("// module \"{}\"", name);
            print!("{}", glue);
        }
    }
    Ok(())
}
