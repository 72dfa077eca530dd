//! Processor class listing.

use clap::Args;
use vectra_core::{ProcessorCategory, ProcessorRegistry};
use vectra_registry::WithBuiltins;

const CATEGORIES: [ProcessorCategory; 4] = [
    ProcessorCategory::Generator,
    ProcessorCategory::Arithmetic,
    ProcessorCategory::Routing,
    ProcessorCategory::Utility,
];

#[derive(Args)]
pub struct ClassesArgs {
    /// Only list classes in this category (generator, arithmetic, routing, utility)
    #[arg(long)]
    category: Option<String>,
}

pub fn run(args: ClassesArgs) -> anyhow::Result<()> {
    let registry = ProcessorRegistry::with_builtins();

    let categories: Vec<ProcessorCategory> = match &args.category {
        Some(name) => {
            let category = CATEGORIES
                .into_iter()
                .find(|c| c.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow::anyhow!("Unknown category: {}", name))?;
            vec![category]
        }
        None => CATEGORIES.to_vec(),
    };

    println!("Processor Classes");
    println!("=================");

    for category in categories {
        let classes = registry.in_category(category);
        if classes.is_empty() {
            continue;
        }
        println!();
        println!("{}:", category.name());
        for class in classes {
            println!(
                "  {:10}  in: {:24}  out: {:24}  {}",
                class.class,
                class.inputs.join(","),
                class.outputs.join(","),
                class.description
            );
        }
    }

    Ok(())
}
