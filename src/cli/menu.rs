use anyhow::Result;
use tracing::error;

use crate::store::resolution_storage::ResolutionStorage;

use super::{
    flows::{
        add_flow, export_flow, graph_flow, list_flow, log_flow, toggle_flow, App, ExportRequest,
        GraphRequest,
    },
    input::parse_choice,
    prompt::{ask, is_interrupt, Interrupt, Prompter},
};

const MENU: &str = "
What would you like to do?
1. Log resolutions
2. Add a resolution
3. Toggle resolutions
4. List resolutions
5. Export to csv
6. Export graph
(q to quit, menu to come back here)";

const CHOICES: usize = 6;

/// Runs flows until the user quits. Errors of a flow are shown and the menu comes back, only
/// [Interrupt::Quit] ends the loop.
pub async fn run_menu<S: ResolutionStorage>(app: &App<S>, prompter: &mut dyn Prompter) -> Result<()> {
    loop {
        prompter.say(MENU);
        let choice = match ask(prompter, "Choice:", |a| parse_choice(a, CHOICES)) {
            Ok(choice) => choice,
            Err(e) if is_interrupt(&e, Interrupt::Menu) => continue,
            Err(e) => return Err(e),
        };

        let result = match choice {
            1 => log_flow(app, prompter, None).await,
            2 => add_flow(app, prompter).await.map(|_| ()),
            3 => toggle_flow(app, prompter, None).await,
            4 => list_flow(app, prompter).await,
            5 => export_flow(app, prompter, ExportRequest::default())
                .await
                .map(|_| ()),
            _ => graph_flow(app, prompter, GraphRequest::default()).await,
        };

        match result {
            Ok(()) => {}
            Err(e) if is_interrupt(&e, Interrupt::Menu) => {}
            Err(e) if is_interrupt(&e, Interrupt::Quit) => return Err(e),
            Err(e) => {
                error!("Menu option {choice} failed {e:?}");
                prompter.say(&format!("Error: {e:#}"));
            }
        }
    }
}
