//! Main control executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Drive input acquisition (replayed from a script)
//!         - Planning, every fifth cycle:
//!             - Path planning and lane change arbitration
//!             - Longitudinal planning
//!         - Lateral control processing
//!         - Longitudinal control processing
//!         - Car control processing
//!         - Send frames to the bus
//!         - Write archives
//!
//! # Modules
//!
//! All modules (e.g. `lat_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!     2. Implement `util::archive::Archived` to record their status reports.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use serde::Serialize;
use structopt::StructOpt;

// Internal
use can_if::bus::BusTransport;
use ctrl_lib::{
    archive_bus::ArchiveBus, car_ctrl, data_store::DataStore, lat_ctrl, long_ctrl, long_plan,
    path_plan, vehicle::DriveInput,
};
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{Pending, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.01;

/// Number of control cycles per planning cycle.
const PLAN_PERIOD_CYCLES: u64 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line arguments.
#[derive(Debug, StructOpt)]
#[structopt(name = "ctrl_exec", about = "Drive control executable")]
struct Args {
    /// Drive script to replay
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// Run cycles back to back rather than in real time
    #[structopt(short, long)]
    fast: bool,

    /// Minimum level of messages to log, `info` or more verbose
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,
}

/// Summary of a run, saved to the session at shutdown.
#[derive(Debug, Serialize)]
struct RunSummary {
    num_cycles: u64,

    /// Units: seconds
    sim_duration_s: f64,

    frames_sent: u64,

    bus_errors: u64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("ctrl_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(args.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", args);

    // ---- LOAD SCRIPT ----

    info!("Loading script from {:?}", args.script);

    let mut script: ScriptInterpreter<DriveInput> =
        ScriptInterpreter::new(&args.script).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} inputs\n",
        script.get_duration(),
        script.get_num_pending()
    );

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.path_plan
        .init("path_plan.toml", &session)
        .wrap_err("Failed to initialise PathPlan")?;
    info!("PathPlan init complete");

    ds.long_plan
        .init("long_plan.toml", &session)
        .wrap_err("Failed to initialise LongPlan")?;
    info!("LongPlan init complete");

    ds.lat_ctrl
        .init("lat_ctrl.toml", &session)
        .wrap_err("Failed to initialise LatCtrl")?;
    info!("LatCtrl init complete");

    ds.long_ctrl
        .init("long_ctrl.toml", &session)
        .wrap_err("Failed to initialise LongCtrl")?;
    info!("LongCtrl init complete");

    ds.car_ctrl
        .init("car_ctrl.toml", &session)
        .wrap_err("Failed to initialise CarCtrl")?;
    info!("CarCtrl init complete");

    let mut bus = ArchiveBus::new(&session).wrap_err("Failed to initialise the bus archive")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_PERIOD_S, PLAN_PERIOD_CYCLES);

        // ---- DATA INPUT ----

        // The most recent scripted input is held until the next one is due
        match script.get_pending(ds.sim_time_s) {
            Pending::None => (),
            Pending::Some(inputs) => {
                if let Some(input) = inputs.into_iter().last() {
                    ds.drive_input = input;
                }
            }
            Pending::EndOfScript => {
                info!("End of drive script reached, stopping");
                break;
            }
        }

        let enabled = ds.drive_input.enabled;
        let vehicle = ds.drive_input.vehicle;

        // ---- PLANNING ----

        if ds.is_plan_cycle {
            match ds.path_plan.proc(&path_plan::InputData {
                active: enabled,
                time_s: ds.sim_time_s,
                vehicle,
                lanes: ds.drive_input.lanes,
            }) {
                Ok((o, r)) => {
                    ds.path_plan_output = o;
                    ds.path_plan_status_rpt = r;
                }
                Err(e) => warn!("Error during PathPlan processing: {}", e),
            }

            match ds.long_plan.proc(&long_plan::InputData {
                enabled,
                time_s: ds.sim_time_s,
                vehicle,
                lead: ds.drive_input.lead,
                v_cruise_ms: ds.drive_input.v_cruise_ms,
            }) {
                Ok((o, r)) => {
                    ds.long_plan_output = o;
                    ds.long_plan_status_rpt = r;
                }
                Err(e) => warn!("Error during LongPlan processing: {}", e),
            }

            ds.update_target();
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        ds.lat_ctrl_input = lat_ctrl::InputData {
            active: enabled,
            time_s: ds.sim_time_s,
            vehicle,
            angle_traj: ds.target.angle_traj.clone(),
            rate_des_degs: ds.target.rate_des_degs,
        };
        match ds.lat_ctrl.proc(&ds.lat_ctrl_input) {
            Ok((o, r)) => {
                ds.lat_ctrl_output = o;
                ds.lat_ctrl_status_rpt = r;
            }
            Err(e) => warn!("Error during LatCtrl processing: {}", e),
        }

        ds.long_ctrl_input = long_ctrl::InputData {
            active: enabled,
            time_s: ds.sim_time_s,
            vehicle,
            v_target_ms: ds.target.v_target_ms,
            v_target_future_ms: ds.target.v_target_future_ms,
            a_target_mss: ds.target.a_target_mss,
            fcw: ds.drive_input.fcw,
            lead: ds.drive_input.lead,
            gas_profile: ds.drive_input.gas_profile,
        };
        match ds.long_ctrl.proc(&ds.long_ctrl_input) {
            Ok((o, r)) => {
                ds.long_ctrl_output = o;
                ds.long_ctrl_status_rpt = r;
            }
            Err(e) => warn!("Error during LongCtrl processing: {}", e),
        }

        ds.car_ctrl_input = car_ctrl::InputData {
            time_s: ds.sim_time_s,
            enabled,
            vehicle,
            lanes: ds.drive_input.lanes,
            lead: ds.drive_input.lead,
            steer_cmd: ds.lat_ctrl_output.steer_cmd,
            gas: ds.long_ctrl_output.gas,
            brake: ds.long_ctrl_output.brake,
            cruise_cancel: ds.drive_input.cruise_cancel,
            steer_required: ds.drive_input.steer_required || ds.lat_ctrl_status_rpt.saturated,
            left_lane_depart: ds.drive_input.left_lane_depart,
            right_lane_depart: ds.drive_input.right_lane_depart,
            // Stock frames are only seen once
            stock_frames: std::mem::take(&mut ds.drive_input.stock_frames),
        };
        match ds.car_ctrl.proc(&ds.car_ctrl_input) {
            Ok((o, r)) => {
                ds.car_ctrl_output = o;
                ds.car_ctrl_status_rpt = r;
            }
            Err(e) => warn!("Error during CarCtrl processing: {}", e),
        }

        // ---- BUS OUTPUT ----

        bus.set_time(ds.sim_time_s);
        if let Err(e) = bus.send(&ds.car_ctrl_output.frames) {
            ds.num_bus_errors += 1;
            warn!("Could not send frames: {}", e);
        }

        // ---- WRITE ARCHIVES ----

        if ds.is_plan_cycle {
            write_archive("PathPlan", &mut ds.path_plan);
            write_archive("LongPlan", &mut ds.long_plan);
        }
        write_archive("LatCtrl", &mut ds.lat_ctrl);
        write_archive("LongCtrl", &mut ds.long_ctrl);
        write_archive("CarCtrl", &mut ds.car_ctrl);

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                if !args.fast {
                    thread::sleep(d);
                }
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        ds.cycle_end();
    }

    // ---- SHUTDOWN ----

    info!(
        "Ran {} cycles, sent {} frames ({} bus errors)",
        ds.num_cycles,
        bus.num_sent(),
        ds.num_bus_errors
    );

    let summary = RunSummary {
        num_cycles: ds.num_cycles,
        sim_duration_s: ds.sim_time_s,
        frames_sent: bus.num_sent(),
        bus_errors: ds.num_bus_errors,
    };
    session
        .save_json("summary.json", &summary)
        .wrap_err("Failed to save the run summary")?;

    info!("End of execution");

    Ok(())
}

/// Write a module's archives, warning on failure.
fn write_archive<A: Archived>(name: &str, module: &mut A) {
    if let Err(e) = module.write() {
        warn!("Could not write the {} archive: {}", name, e);
    }
}
