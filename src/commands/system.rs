use crate::model::EnvVariable;
use crate::{ui, Workspace};
use anyhow::Result;

fn print_variables(variables: &[EnvVariable]) {
    for var in variables {
        ui::assignment(&var.key, &var.value);
    }
}

pub fn show(workspace: &Workspace, scoped: bool) -> Result<()> {
    if !scoped {
        print_variables(&workspace.get_system_env());
        return Ok(());
    }

    let env = workspace.get_scoped_env();
    for (label, variables) in [
        ("System", &env.system),
        ("User", &env.user),
        ("Process", &env.process),
    ] {
        ui::heading(label, format!("{} variable(s)", variables.len()));
        print_variables(variables);
    }
    Ok(())
}
