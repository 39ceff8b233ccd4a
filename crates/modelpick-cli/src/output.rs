use std::io::{self, Write};

use modelpick_catalog::{CatalogModel, CatalogSnapshot, ProviderSnapshot, ProviderStatus};
use modelpick_registry::ModelOrigin;

pub fn print_providers(out: &mut impl Write, snapshot: &CatalogSnapshot) -> io::Result<()> {
    for provider in snapshot.providers() {
        write_provider_line(out, provider)?;
    }
    Ok(())
}

pub fn print_models(out: &mut impl Write, provider: &ProviderSnapshot, all: bool) -> io::Result<()> {
    write_provider_line(out, provider)?;
    let models = provider
        .models
        .iter()
        .filter(|model| all || model.record.visible);
    for model in models {
        write_model_line(out, model)?;
    }
    Ok(())
}

fn write_provider_line(out: &mut impl Write, provider: &ProviderSnapshot) -> io::Result<()> {
    let visible = provider.visible_models().count();
    write!(
        out,
        "{} ({}) [{} | {} models]",
        provider.provider_id, provider.provider_name, provider.status, visible
    )?;
    match (&provider.status, &provider.error) {
        (ProviderStatus::Error, Some(error)) => writeln!(out, " {error}"),
        (ProviderStatus::MissingConfig, _) => writeln!(out, " run `modelpick set-key`"),
        _ => writeln!(out),
    }
}

fn write_model_line(out: &mut impl Write, model: &CatalogModel) -> io::Result<()> {
    let record = &model.record;
    let mut tags = Vec::new();
    if record.origin != ModelOrigin::Builtin {
        tags.push(record.origin.as_str());
    }
    if !record.visible {
        tags.push("hidden");
    }
    let caps = &record.capabilities;
    for (flag, name) in [
        (caps.vision, "vision"),
        (caps.tools, "tools"),
        (caps.reasoning, "reasoning"),
    ] {
        if flag {
            tags.push(name);
        }
    }

    let context = record
        .limits
        .context_length
        .map(|tokens| format!("{}k", tokens / 1000))
        .unwrap_or_default();
    writeln!(
        out,
        "  {:<32} {:<28} {:>6}  {}",
        record.id,
        record.display_name,
        context,
        tags.join(", ")
    )
}
