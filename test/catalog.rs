// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use zorin_setup::{
    catalog::{Catalog, CatalogError},
    config::SetupDefinition,
    step::Criticality,
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::path::PathBuf;

#[sealed_test(env = [("HOME", "/home/zorin"), ("XDG_CACHE_HOME", "/home/zorin/.cache")])]
fn builtin_definition_builds_catalog() -> Result<()> {
    let definition = SetupDefinition::builtin()?;
    let catalog = Catalog::build(&definition)?;

    let names = catalog
        .descriptors()
        .into_iter()
        .map(|descriptor| descriptor.name)
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "base-packages",
            "shell",
            "oh-my-zsh",
            "rustup",
            "nvm",
            "shell-plugins",
            "vscode",
            "sublime-text",
            "snaps",
            "fonts",
            "dotfiles",
            "projects",
            "desktop-settings",
            "gnome-extensions",
        ]
    );
    assert_eq!(
        definition.cache_dir()?,
        PathBuf::from("/home/zorin/.cache/zorin-setup")
    );

    Ok(())
}

#[sealed_test(env = [("HOME", "/home/zorin")])]
fn builtin_gates_all_have_questions() -> Result<()> {
    let definition = SetupDefinition::builtin()?;
    let catalog = Catalog::build(&definition)?;

    for descriptor in catalog.descriptors() {
        if let Some(gate) = &descriptor.gate {
            assert!(
                definition.gates.contains_key(gate),
                "{} has unknown gate {gate}",
                descriptor.name
            );
        }
    }

    let required = catalog
        .descriptors()
        .into_iter()
        .filter(|descriptor| descriptor.criticality == Criticality::Required)
        .map(|descriptor| descriptor.name)
        .collect::<Vec<_>>();
    assert_eq!(required, vec!["base-packages", "shell", "oh-my-zsh", "dotfiles"]);

    Ok(())
}

#[sealed_test(env = [("HOME", "/home/zorin")])]
fn listing_numbers_steps_from_one() -> Result<()> {
    let definition: SetupDefinition = indoc! {r#"
        [gates]
        editors = "Install editors?"

        [packages]
        names = ["git", "curl"]

        [[repositories]]
        name = "vscode"
        key_url = "https://packages.microsoft.com/keys/microsoft.asc"
        keyring = "/usr/share/keyrings/packages.microsoft.gpg"
        source = "deb https://packages.microsoft.com/repos/code stable main"
        list_file = "/etc/apt/sources.list.d/vscode.list"
        packages = ["code"]
        gate = "editors"
    "#}
    .parse()?;
    let catalog = Catalog::build(&definition)?;

    let listing = catalog
        .descriptors()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    assert_eq!(
        listing,
        vec![
            " 1. base-packages [apt-packages, required] git, curl",
            " 2. vscode [apt-repository, optional, gate: editors] code from deb https://packages.microsoft.com/repos/code stable main",
        ]
    );

    Ok(())
}

#[sealed_test(env = [("HOME", "/home/zorin")])]
fn definition_without_gate_question_is_rejected() -> Result<()> {
    let definition: SetupDefinition = indoc! {r#"
        [[snaps]]
        name = "spotify"
    "#}
    .parse()?;

    let result = Catalog::build(&definition);
    assert!(matches!(
        result,
        Err(CatalogError::UnknownGate { ref step, ref gate }) if step == "snaps" && gate == "snaps"
    ));

    Ok(())
}
