use crate::core::registry::{list_popular, search, ModelFamily};

pub fn list_families(query: Option<&str>, popular_only: bool) {
    let mut matches = match query {
        Some(query) => search(query),
        None if popular_only => list_popular(),
        None => search(""),
    };
    if popular_only {
        matches.retain(|family| family.popular);
    }

    if matches.is_empty() {
        match query {
            Some(query) => println!("No model families match '{query}'."),
            None => println!("No model families found."),
        }
        return;
    }

    for family in matches {
        print_family(family);
    }
}

fn print_family(family: &ModelFamily) {
    let star = if family.popular { " ★" } else { "" };
    println!("{} ({}){star}", family.name, family.id);
    println!("  {}", family.description);
    println!("  Sources: {}", source_summary(family));
    for variant in &family.variants {
        println!("    {:<28} {}", variant.id, variant.label);
    }
    println!();
}

fn source_summary(family: &ModelFamily) -> String {
    family
        .sources
        .iter()
        .map(|source| {
            if source.coming_soon {
                format!("{} (coming soon)", source.kind)
            } else {
                source.kind.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
