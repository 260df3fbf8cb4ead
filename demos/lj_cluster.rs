use std::sync::Arc;

use minim::context::{MinimiserContext, MinimiserKind};
use minim::parallel::RayonComm;
use minim::potentials::Lj3d;
use rand::Rng;

fn main() {
    env_logger::init();

    // 13 particles scattered in a box, relaxed on 4 in-process ranks
    let n = 13;
    let mut rng = rand::thread_rng();
    let coords: Vec<f64> = (0..3 * n).map(|_| 2.5 * rng.r#gen::<f64>()).collect();
    let pot = Arc::new(Lj3d::default().potential(coords.len()).unwrap());
    let context = MinimiserContext::new(MinimiserKind::Lbfgs);

    let results = RayonComm::run(4, |comm| {
        let mut state = pot.new_state(&coords, comm.into()).unwrap();
        let stats = context.run(&mut state).unwrap();
        (stats, state.coords().unwrap())
    })
    .unwrap();

    let (stats, coords) = &results[0];
    println!("stats = {stats:?}");
    println!("E = {:.8}", stats.energy);
    for (i, p) in coords.chunks(3).enumerate() {
        println!("{i:3} {:10.5} {:10.5} {:10.5}", p[0], p[1], p[2]);
    }
}
