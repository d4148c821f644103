//! # Control Cycle Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use can_if::frame::LayoutTable;
use ctrl_lib::{
    car_ctrl::{self, CarCtrl},
    data_store::DataStore,
    lat_ctrl, long_ctrl, long_plan, path_plan,
    vehicle::{GasProfile, LanePerception, LeadState, VehicleState},
};
use util::{module::State, params};

fn ctrl_cycle_benchmark(c: &mut Criterion) {
    // ---- Build the modules ----

    let layouts: LayoutTable = params::parse(include_str!("../../params/frames.toml")).unwrap();

    let mut ds = DataStore::default();
    ds.car_ctrl = CarCtrl::new(car_ctrl::Params::default(), layouts).unwrap();

    // Gentle curve with a lead ahead
    let vehicle = VehicleState {
        v_ego_ms: 20.0,
        a_ego_mss: 0.2,
        steer_angle_deg: 2.0,
        ..Default::default()
    };
    let lanes = LanePerception {
        l_poly: [0.0, 0.0002, 0.01, 1.7],
        r_poly: [0.0, 0.0002, 0.01, -1.9],
        p_poly: [0.0, 0.0002, 0.01, -0.1],
        l_prob: 0.9,
        r_prob: 0.9,
        lane_width_m: 3.6,
        ..Default::default()
    };
    let lead = Some(LeadState {
        x_rel_m: 35.0,
        v_lead_ms: 18.0,
        a_lead_mss: 0.0,
    });

    c.bench_function("ctrl_cycle", |b| {
        b.iter(|| {
            ds.cycle_start(0.01, 1);

            let (o, _) = ds
                .path_plan
                .proc(&path_plan::InputData {
                    active: true,
                    time_s: ds.sim_time_s,
                    vehicle,
                    lanes,
                })
                .unwrap();
            ds.path_plan_output = o;

            let (o, _) = ds
                .long_plan
                .proc(&long_plan::InputData {
                    enabled: true,
                    time_s: ds.sim_time_s,
                    vehicle,
                    lead,
                    v_cruise_ms: 25.0,
                })
                .unwrap();
            ds.long_plan_output = o;

            ds.update_target();

            let (lat, _) = ds
                .lat_ctrl
                .proc(&lat_ctrl::InputData {
                    active: true,
                    time_s: ds.sim_time_s,
                    vehicle,
                    angle_traj: ds.target.angle_traj.clone(),
                    rate_des_degs: ds.target.rate_des_degs,
                })
                .unwrap();

            let (long, _) = ds
                .long_ctrl
                .proc(&long_ctrl::InputData {
                    active: true,
                    time_s: ds.sim_time_s,
                    vehicle,
                    v_target_ms: ds.target.v_target_ms,
                    v_target_future_ms: ds.target.v_target_future_ms,
                    a_target_mss: ds.target.a_target_mss,
                    fcw: false,
                    lead,
                    gas_profile: GasProfile::Normal,
                })
                .unwrap();

            let (frames, _) = ds
                .car_ctrl
                .proc(&car_ctrl::InputData {
                    time_s: ds.sim_time_s,
                    enabled: true,
                    vehicle,
                    lanes,
                    lead,
                    steer_cmd: lat.steer_cmd,
                    gas: long.gas,
                    brake: long.brake,
                    ..Default::default()
                })
                .unwrap();
            ds.car_ctrl_output = frames;

            ds.cycle_end();
        })
    });
}

criterion_group!(benches, ctrl_cycle_benchmark);
criterion_main!(benches);
