mod fanout_tests;
mod mediator_flow_tests;
